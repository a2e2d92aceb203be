use crate::error::{EmberViewError, Result};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;

/// Watches a live template directory and reports every change.
///
/// The watcher is held to keep it alive. When `TemplateWatcher` is dropped,
/// the OS watch is released and the callback is never invoked again.
pub(crate) struct TemplateWatcher {
  _watcher: RecommendedWatcher,
}

impl TemplateWatcher {
  /// Starts watching `root` recursively.
  ///
  /// `on_change` runs on the watcher's own thread for every create, modify
  /// or remove event, once per affected path.
  pub(crate) fn start<F>(root: &Path, on_change: F) -> Result<Self>
  where
    F: Fn(&EventKind, &Path) + Send + 'static,
  {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
      let event = match res {
        Ok(event) => event,
        Err(e) => {
          log::error!("File watch error: {:?}", e);
          return;
        }
      };

      // Reads during a reload show up as access events; ignore them.
      if !(event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove()) {
        return;
      }

      for path in &event.paths {
        on_change(&event.kind, path);
      }
    })?;

    watcher
      .watch(root, RecursiveMode::Recursive)
      .map_err(EmberViewError::Watcher)?;
    log::info!("Watching templates in {}", root.display());

    Ok(Self { _watcher: watcher })
  }
}

/// Whether a changed file belongs to the template family of `extension`.
///
/// Both `.htm` and `.html` count for `.html`: the shorter of the two
/// extensions must be a prefix of the other and at least three characters.
pub(crate) fn is_template_family(path: &Path, extension: &str) -> bool {
  let configured = extension.trim_start_matches('.');
  let Some(changed) = path.extension().and_then(|ext| ext.to_str()) else {
    return false;
  };
  if changed == configured {
    return true;
  }
  let (short, long) = if changed.len() < configured.len() {
    (changed, configured)
  } else {
    (configured, changed)
  };
  short.len() >= 3 && long.starts_with(short)
}
