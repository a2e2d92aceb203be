use crate::core::app::TeraViews;
use crate::core::assets::{AssetRequest, AssetResponse, AssetServer, BuildTimestamp, Outcome};
use crate::core::source::TemplateSource;
use crate::error::{EmberViewError, Result};

use actix_files::NamedFile;
use actix_web::{
  HttpRequest, HttpResponse,
  http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, HeaderMap, HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH},
  web::{self, ServiceConfig},
};
use futures_util::future::{FutureExt, LocalBoxFuture};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type NextHandler = Arc<dyn Fn(HttpRequest) -> LocalBoxFuture<'static, actix_web::Result<HttpResponse>> + Send + Sync>;

/// Serves static files from a template source under a URL prefix.
///
/// Mounted at `/`, it becomes a catch-all that serves what it can and hands
/// every other request to the [`fallback`](Self::fallback) handler, which is
/// typically a single-page application's entry point.
///
/// ```rust,no_run
/// use actix_web::{App, HttpResponse, HttpServer};
/// use emberview::{StaticAssets, TemplateSource, TeraViews};
///
/// # async fn run() -> std::io::Result<()> {
/// let views = TeraViews::builder(TemplateSource::directory("views").unwrap()).build().unwrap();
/// let assets = StaticAssets::new(&views, "/", "public")
///   .unwrap()
///   .fallback(|_req| async { Ok(HttpResponse::Ok().body("app shell")) });
///
/// HttpServer::new(move || App::new().configure(|cfg| assets.configure(cfg)))
///   .bind(("127.0.0.1", 3000))?
///   .run()
///   .await
/// # }
/// ```
#[derive(Clone)]
pub struct StaticAssets {
  server: Arc<AssetServer>,
  prefix: String,
  fallback: Option<NextHandler>,
}

impl StaticAssets {
  /// Serves `folder` of the views' template source under `prefix`.
  pub fn new(views: &TeraViews, prefix: &str, folder: &str) -> Result<Self> {
    Self::from_source(views.source().clone(), prefix, folder)
  }

  pub fn from_source(source: TemplateSource, prefix: &str, folder: &str) -> Result<Self> {
    Ok(Self::from_server(AssetServer::new(source, folder)?, prefix))
  }

  pub fn from_server(server: AssetServer, prefix: &str) -> Self {
    Self {
      server: Arc::new(server),
      prefix: prefix.trim_end_matches('/').to_string(),
      fallback: None,
    }
  }

  /// Overrides the `Last-Modified` time of embedded assets.
  pub fn build_timestamp(mut self, modified: BuildTimestamp) -> Self {
    self.server = Arc::new((*self.server).clone().with_timestamp(modified));
    self
  }

  /// The handler a root mount defers to when it has nothing to serve.
  ///
  /// Without one, such requests get `404 Not Found`.
  pub fn fallback<F, Fut>(mut self, handler: F) -> Self
  where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = actix_web::Result<HttpResponse>> + 'static,
  {
    self.fallback = Some(Arc::new(move |req: HttpRequest| handler(req).boxed_local()));
    self
  }

  /// Whether this is the catch-all mount at `/`.
  pub fn is_root(&self) -> bool {
    self.prefix.is_empty()
  }

  /// Registers the `GET {prefix}/{tail:.*}` route.
  pub fn configure(&self, cfg: &mut ServiceConfig) {
    let route = format!("{}/{{tail:.*}}", self.prefix);
    log::debug!("Serving static assets at {}", route);

    let assets = self.clone();
    cfg.route(
      &route,
      web::get().to(move |req: HttpRequest| {
        let assets = assets.clone();
        async move { assets.handle(req).await }
      }),
    );
  }

  async fn handle(&self, req: HttpRequest) -> actix_web::Result<HttpResponse> {
    let suffix = req.match_info().get("tail").unwrap_or_default().to_string();

    if !self.is_root() {
      return Ok(self.serve(&req, &suffix).await?);
    }

    match Outcome::settle(&suffix, || self.serve(&req, &suffix)).await? {
      Outcome::Respond(response) => Ok(response),
      Outcome::PassThrough => match &self.fallback {
        Some(next) => next(req).await,
        None => Ok(HttpResponse::NotFound().finish()),
      },
    }
  }

  async fn serve(&self, req: &HttpRequest, suffix: &str) -> Result<HttpResponse> {
    if self.server.is_live() {
      let path = self.server.locate(suffix)?;
      let file = NamedFile::open_async(&path)
        .await
        .map_err(|_| EmberViewError::AssetNotFound(suffix.to_string()))?;
      return Ok(file.use_etag(false).use_last_modified(false).into_response(req));
    }

    let headers = req.headers();
    let request = AssetRequest {
      suffix,
      if_modified_since: header(headers, &IF_MODIFIED_SINCE),
      if_none_match: header(headers, &IF_NONE_MATCH),
      accept_encoding: header(headers, &ACCEPT_ENCODING),
      content_encoding: header(headers, &CONTENT_ENCODING),
    };
    Ok(into_http(self.server.resolve(&request)?))
  }
}

impl fmt::Debug for StaticAssets {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StaticAssets")
      .field("server", &self.server)
      .field("prefix", &self.prefix)
      .field("fallback", &self.fallback.is_some())
      .finish()
  }
}

fn header<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
  headers.get(name).and_then(|value| value.to_str().ok())
}

fn into_http(asset: AssetResponse) -> HttpResponse {
  let mut builder = HttpResponse::build(asset.status);
  for (name, value) in asset.headers {
    builder.insert_header((name, value));
  }
  if asset.body.is_empty() {
    builder.finish()
  } else {
    builder.body(asset.body)
  }
}
