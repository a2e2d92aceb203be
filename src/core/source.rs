use crate::error::{EmberViewError, Result};

use rust_embed::RustEmbed;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

type Reader = dyn Fn(&str) -> Option<Cow<'static, [u8]>> + Send + Sync;

/// Where templates and static files come from.
///
/// A live directory is read from disk on every load and can be watched for
/// changes. A snapshot is an immutable bundle fixed at build time.
#[derive(Debug, Clone)]
pub enum TemplateSource {
  Directory(DirSource),
  Snapshot(Snapshot),
}

impl TemplateSource {
  /// Opens a live directory. Fails if `root` is missing or not a directory.
  pub fn directory(root: impl AsRef<Path>) -> Result<Self> {
    DirSource::open(root).map(Self::Directory)
  }

  pub fn snapshot(snapshot: Snapshot) -> Self {
    Self::Snapshot(snapshot)
  }

  /// Shorthand for a snapshot of a `rust_embed` folder.
  pub fn embedded<E: RustEmbed + 'static>() -> Self {
    Self::Snapshot(Snapshot::from_embed::<E>())
  }

  /// Prefers the live directory when it exists, otherwise falls back to the snapshot.
  ///
  /// This is the usual development/production split: run from the project
  /// checkout and templates are live, ship the binary alone and the embedded
  /// copy is served.
  pub fn detect(root: impl AsRef<Path>, snapshot: Option<Snapshot>) -> Result<Self> {
    let root = root.as_ref();
    if root.is_dir() {
      return Self::directory(root);
    }
    snapshot
      .map(Self::Snapshot)
      .ok_or_else(|| EmberViewError::SourceUnavailable(root.display().to_string()))
  }

  /// Every file in the source, relative to its root, `/`-separated and sorted.
  pub fn files(&self) -> Result<Vec<String>> {
    match self {
      Self::Directory(dir) => dir.files(),
      Self::Snapshot(snapshot) => Ok(snapshot.files.iter().cloned().collect()),
    }
  }

  /// Reads a whole file by its relative path.
  pub fn read(&self, path: &str) -> Result<Cow<'static, [u8]>> {
    match self {
      Self::Directory(dir) => Ok(Cow::Owned(fs::read(dir.root.join(path))?)),
      Self::Snapshot(snapshot) => {
        (snapshot.reader)(path).ok_or_else(|| EmberViewError::AssetNotFound(path.to_string()))
      }
    }
  }

  pub fn contains(&self, path: &str) -> bool {
    match self {
      Self::Directory(dir) => dir.root.join(path).is_file(),
      Self::Snapshot(snapshot) => snapshot.files.contains(path),
    }
  }

  /// The directory to watch for changes, or `None` for immutable snapshots.
  pub fn live_root(&self) -> Option<&Path> {
    match self {
      Self::Directory(dir) => Some(&dir.root),
      Self::Snapshot(_) => None,
    }
  }

  /// A human-readable name for the source, used as the default set name.
  pub fn display_name(&self) -> String {
    match self {
      Self::Directory(dir) => dir
        .root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.root.display().to_string()),
      Self::Snapshot(_) => "embedded".to_string(),
    }
  }
}

/// A live template directory on disk.
#[derive(Debug, Clone)]
pub struct DirSource {
  root: PathBuf,
}

impl DirSource {
  pub fn open(root: impl AsRef<Path>) -> Result<Self> {
    let root = root.as_ref();
    match fs::metadata(root) {
      Ok(meta) if meta.is_dir() => {}
      _ => return Err(EmberViewError::SourceUnavailable(root.display().to_string())),
    }
    let root = root.canonicalize()?;
    Ok(Self { root })
  }

  fn files(&self) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(&self.root).follow_links(true) {
      let entry = entry.map_err(io::Error::from)?;
      if !entry.file_type().is_file() {
        continue;
      }
      let Ok(relative) = entry.path().strip_prefix(&self.root) else {
        continue;
      };
      files.push(to_slash(relative));
    }
    files.sort();
    Ok(files)
  }
}

/// An immutable, build-time-fixed bundle of files.
///
/// The file index is taken once at construction. Reads go through the
/// underlying store, so a listed file can still fail to read.
#[derive(Clone)]
pub struct Snapshot {
  files: BTreeSet<String>,
  reader: Arc<Reader>,
}

impl Snapshot {
  /// Snapshots a `rust_embed` folder.
  pub fn from_embed<E: RustEmbed + 'static>() -> Self {
    let files = E::iter().map(|path| path.replace('\\', "/")).collect();
    let reader: Arc<Reader> = Arc::new(|path: &str| E::get(path).map(|file| file.data));
    Self { files, reader }
  }

  /// Builds a snapshot from in-memory `(path, contents)` pairs.
  pub fn from_files<I, P, D>(files: I) -> Self
  where
    I: IntoIterator<Item = (P, D)>,
    P: Into<String>,
    D: Into<Vec<u8>>,
  {
    let contents: BTreeMap<String, Vec<u8>> = files
      .into_iter()
      .map(|(path, data)| (path.into().trim_start_matches('/').replace('\\', "/"), data.into()))
      .collect();
    let files = contents.keys().cloned().collect();
    let contents = Arc::new(contents);
    let reader: Arc<Reader> = Arc::new(move |path: &str| contents.get(path).map(|data| Cow::Owned(data.clone())));
    Self { files, reader }
  }
}

impl fmt::Debug for Snapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Snapshot").field("files", &self.files.len()).finish()
  }
}

/// What a discovered file is, decided once when the source is scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EntryKind {
  /// A template, addressable by `name` (path without the template extension).
  Template { name: String },
  /// Anything else; only ever served as bytes.
  Asset,
}

impl EntryKind {
  pub(crate) fn classify(path: &str, extension: &str) -> Self {
    match path.strip_suffix(extension) {
      Some(name) if !extension.is_empty() && !name.is_empty() && !name.ends_with('/') => Self::Template {
        name: name.to_string(),
      },
      _ => Self::Asset,
    }
  }
}

#[derive(Debug, Clone)]
pub(crate) struct SourceEntry {
  path: String,
  kind: EntryKind,
}

/// The classified listing of a source.
#[derive(Debug, Clone, Default)]
pub(crate) struct Catalog {
  entries: Vec<SourceEntry>,
}

impl Catalog {
  pub(crate) fn scan(source: &TemplateSource, extension: &str) -> Result<Self> {
    let entries = source
      .files()?
      .into_iter()
      .map(|path| {
        let kind = EntryKind::classify(&path, extension);
        SourceEntry { path, kind }
      })
      .collect();
    Ok(Self { entries })
  }

  /// `(path, name)` for every template entry.
  pub(crate) fn templates(&self) -> impl Iterator<Item = (&str, &str)> {
    self.entries.iter().filter_map(|entry| match &entry.kind {
      EntryKind::Template { name } => Some((entry.path.as_str(), name.as_str())),
      EntryKind::Asset => None,
    })
  }

}

fn to_slash(path: &Path) -> String {
  path
    .components()
    .map(|component| component.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}
