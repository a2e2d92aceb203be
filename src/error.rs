use thiserror::Error;

/// A specialized `Result` type for `emberview` operations.
pub type Result<T, E = EmberViewError> = std::result::Result<T, E>;

/// The primary error type for all `emberview` operations.
#[derive(Debug, Error)]
pub enum EmberViewError {
  /// A template file could not be compiled. The whole load is aborted.
  #[error("failed to parse template '{name}': {source}")]
  TemplateParse {
    name: String,
    #[source]
    source: tera::Error,
  },

  /// The compiled set has no template under the requested name.
  #[error("template '{0}' does not exist")]
  TemplateNotFound(String),

  /// The compiled set has no template under the requested layout name.
  #[error("layout '{0}' does not exist")]
  LayoutNotFound(String),

  /// A runtime failure while executing a template against its binding.
  #[error("failed to render template '{name}': {source}")]
  TemplateExecution {
    name: String,
    #[source]
    source: tera::Error,
  },

  /// The reserved layout function was reached with no layout render active.
  #[error("layout function '{0}' invoked outside of a layout render")]
  LayoutInvokedOutsideRender(String),

  /// The requested asset is unknown or could not be read.
  #[error("asset '{0}' not found")]
  AssetNotFound(String),

  /// The requested asset lies outside the served folder.
  #[error("access to asset '{0}' is forbidden")]
  AssetForbidden(String),

  /// The configured source directory is missing or not a directory.
  #[error("template source '{0}' is not a readable directory")]
  SourceUnavailable(String),

  /// An I/O error, typically from reading template files.
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  /// The binding could not be turned into a template context.
  #[error("context serialization error: {0}")]
  Serialization(String),

  /// An error from the file watcher.
  #[error("file watcher error: {0}")]
  Watcher(#[from] notify::Error),
}

impl EmberViewError {
  /// Missing and forbidden assets let a catch-all mount defer to the next handler.
  pub fn passes_through(&self) -> bool {
    matches!(self, Self::AssetNotFound(_) | Self::AssetForbidden(_))
  }
}
