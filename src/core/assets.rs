//! Static asset resolution.
//!
//! Live directories are a plain passthrough: the path is resolved and the
//! integration layer streams the file. Snapshots never change while the
//! process runs, so they get conditional-GET handling (`If-Modified-Since`
//! against the build timestamp, `If-None-Match` against a content
//! fingerprint) and on-the-fly gzip.

use crate::core::sniff;
use crate::core::source::TemplateSource;
use crate::error::{EmberViewError, Result};

use actix_web::http::StatusCode;
use actix_web::http::header::{
  CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, ETAG, HeaderName, HttpDate, LAST_MODIFIED,
};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::BTreeSet;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Tolerance applied to `If-Modified-Since`, which only has second resolution.
const MODIFIED_SINCE_TOLERANCE: Duration = Duration::from_secs(1);

/// The single `Last-Modified` time of every embedded asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildTimestamp(SystemTime);

impl BuildTimestamp {
  /// The running executable's modification time, or now if unavailable.
  pub fn detect() -> Self {
    let modified = std::env::current_exe()
      .and_then(std::fs::metadata)
      .and_then(|meta| meta.modified());
    match modified {
      Ok(time) => Self(time),
      Err(e) => {
        log::debug!("Using process start as build timestamp: {}", e);
        Self(SystemTime::now())
      }
    }
  }

  pub fn at(time: SystemTime) -> Self {
    Self(time)
  }

  pub fn http_date(&self) -> HttpDate {
    HttpDate::from(self.0)
  }

  /// Whether a copy cached at `since` is still current.
  fn unchanged_since(&self, since: SystemTime) -> bool {
    self.0 <= since + MODIFIED_SINCE_TOLERANCE
  }
}

/// The request headers asset resolution looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssetRequest<'a> {
  /// The path below the mount prefix.
  pub suffix: &'a str,
  pub if_modified_since: Option<&'a str>,
  pub if_none_match: Option<&'a str>,
  pub accept_encoding: Option<&'a str>,
  pub content_encoding: Option<&'a str>,
}

impl<'a> AssetRequest<'a> {
  pub fn new(suffix: &'a str) -> Self {
    Self {
      suffix,
      ..Self::default()
    }
  }
}

/// A resolved asset response, independent of any web framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetResponse {
  pub status: StatusCode,
  pub headers: Vec<(HeaderName, String)>,
  pub body: Vec<u8>,
}

impl AssetResponse {
  fn new(status: StatusCode) -> Self {
    Self {
      status,
      headers: Vec::new(),
      body: Vec::new(),
    }
  }

  fn set(&mut self, name: HeaderName, value: impl Into<String>) {
    self.headers.retain(|(existing, _)| *existing != name);
    self.headers.push((name, value.into()));
  }

  pub fn header(&self, name: &HeaderName) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(existing, _)| existing == name)
      .map(|(_, value)| value.as_str())
  }
}

/// What the catch-all mount does with a request.
#[derive(Debug)]
pub enum Outcome<T> {
  /// Answer with this.
  Respond(T),
  /// Nothing to serve here; hand the request to the next handler.
  PassThrough,
}

impl<T> Outcome<T> {
  /// The catch-all policy for a root mount, for live and embedded sources alike.
  ///
  /// An empty suffix passes through without calling `serve`. A suffix that
  /// turns out missing or forbidden passes through too. Every other outcome,
  /// errors included, is final.
  pub async fn settle<F, Fut>(suffix: &str, serve: F) -> Result<Self>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    if suffix.is_empty() {
      return Ok(Self::PassThrough);
    }
    match serve().await {
      Ok(response) => Ok(Self::Respond(response)),
      Err(e) if e.passes_through() => {
        log::debug!("No static asset for '{}': {}", suffix, e);
        Ok(Self::PassThrough)
      }
      Err(e) => Err(e),
    }
  }
}

/// Resolves URL suffixes below a folder of a template source.
#[derive(Debug, Clone)]
pub struct AssetServer {
  source: TemplateSource,
  folder: String,
  // Snapshot paths, taken once. Empty for live directories.
  index: BTreeSet<String>,
  modified: BuildTimestamp,
}

impl AssetServer {
  /// Serves files below `folder` (relative to the source root).
  pub fn new(source: TemplateSource, folder: &str) -> Result<Self> {
    let index = match source.live_root() {
      Some(_) => BTreeSet::new(),
      None => source.files()?.into_iter().collect(),
    };
    Ok(Self {
      source,
      folder: folder.trim_matches('/').to_string(),
      index,
      modified: BuildTimestamp::detect(),
    })
  }

  /// Overrides the `Last-Modified` time of embedded assets.
  pub fn with_timestamp(mut self, modified: BuildTimestamp) -> Self {
    self.modified = modified;
    self
  }

  pub fn is_live(&self) -> bool {
    self.source.live_root().is_some()
  }

  /// The source-relative path for `suffix`.
  ///
  /// `.` and empty segments are dropped and `..` is resolved; a path that
  /// climbs out of the folder is forbidden.
  pub fn asset_path(&self, suffix: &str) -> Result<String> {
    let mut segments: Vec<&str> = self.folder.split('/').filter(|s| !s.is_empty()).collect();
    let floor = segments.len();
    for segment in suffix.split('/') {
      match segment {
        "" | "." => {}
        ".." => {
          if segments.len() == floor {
            return Err(EmberViewError::AssetForbidden(suffix.to_string()));
          }
          segments.pop();
        }
        segment => segments.push(segment),
      }
    }
    Ok(segments.join("/"))
  }

  /// The file on disk for `suffix`. Live directories only.
  pub fn locate(&self, suffix: &str) -> Result<PathBuf> {
    let path = self.asset_path(suffix)?;
    match self.source.live_root() {
      Some(root) if self.source.contains(&path) => Ok(root.join(path)),
      _ => Err(EmberViewError::AssetNotFound(path)),
    }
  }

  /// Resolves an embedded asset, honouring conditional and encoding headers.
  pub fn resolve(&self, request: &AssetRequest<'_>) -> Result<AssetResponse> {
    let path = self.asset_path(request.suffix)?;
    if !self.index.contains(&path) {
      return Err(EmberViewError::AssetNotFound(path));
    }
    let data = match self.source.read(&path) {
      Ok(data) => data,
      Err(e) => {
        log::warn!("Indexed asset '{}' could not be read: {}", path, e);
        return Err(EmberViewError::AssetNotFound(path));
      }
    };

    if let Some(since) = request.if_modified_since.and_then(|value| value.parse::<HttpDate>().ok()) {
      if self.modified.unchanged_since(SystemTime::from(since)) {
        return Ok(AssetResponse::new(StatusCode::NOT_MODIFIED));
      }
    }

    let etag = fingerprint(&data);
    if request.if_none_match == Some(etag.as_str()) {
      return Ok(AssetResponse::new(StatusCode::NOT_MODIFIED));
    }

    let mut response = AssetResponse::new(StatusCode::OK);
    response.set(ETAG, etag);
    response.set(LAST_MODIFIED, self.modified.http_date().to_string());

    let content_type = sniff::content_type(&path, &data);
    if !content_type.is_empty() {
      response.set(CONTENT_TYPE, content_type);
    }

    if data.is_empty() {
      response.set(CONTENT_LENGTH, "0");
      return Ok(response);
    }

    let accepts_gzip = request.accept_encoding.is_some_and(|value| value.contains("gzip"));
    if request.content_encoding.is_none() && accepts_gzip {
      response.body = gzip(&data)?;
      response.set(CONTENT_ENCODING, "gzip");
    } else {
      response.body = data.into_owned();
    }
    response.set(CONTENT_LENGTH, response.body.len().to_string());
    log::debug!("Serving embedded asset '{}' ({} bytes)", path, response.body.len());
    Ok(response)
  }
}

/// Hex MD5 of the content. Used for change detection only.
pub fn fingerprint(data: &[u8]) -> String {
  format!("{:x}", md5::compute(data))
}

fn gzip(data: &[u8]) -> Result<Vec<u8>> {
  let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
  encoder.write_all(data)?;
  Ok(encoder.finish()?)
}
