//! # EmberView
//!
//! Tera views for Actix Web: whole-set template compilation from a live
//! directory or an embedded snapshot, layouts, live template reload and a
//! static asset server with conditional GET and gzip.
//!
//! ## Features
//!
//! - **Two sources:** Read templates from a directory during development and
//!   from a `rust_embed` bundle in production, with the same API.
//! - **Layouts:** A layout template calls `<% embed() %>` where the page body goes.
//! - **Custom Delimiters:** Actions are written `<% ... %>` by default; any pair
//!   of delimiters can be configured.
//! - **Live Reload:** Edits to a watched template directory are picked up by the
//!   next render, without restarting the server.
//! - **Static Assets:** Embedded files are served with `ETag`, `Last-Modified`
//!   and on-the-fly gzip. Mounted at `/`, the asset server falls through to your
//!   own handler for anything it does not know, which suits single-page apps.
//!
//! ## Quickstart
//!
//! ```rust,no_run
//! use actix_web::{web, App, HttpServer, Responder};
//! use emberview::{StaticAssets, TemplateSource, TeraViews};
//! use emberview::tera::Context;
//!
//! // An Actix handler that renders a template inside a layout.
//! async fn index(views: web::Data<TeraViews>) -> impl Responder {
//!   let mut context = Context::new();
//!   context.insert("page_title", "Welcome");
//!   // The `render` method returns a `Template` struct which is a Responder.
//!   views.render("index", context).layout("layouts/main")
//! }
//!
//! #[actix_web::main]
//! async fn main() -> std::io::Result<()> {
//!   let views = TeraViews::builder(TemplateSource::directory("views").expect("views directory"))
//!     .add_global("site_name", "My Awesome Site")
//!     .build()
//!     .expect("Failed to build TeraViews");
//!   let assets = StaticAssets::new(&views, "/static", "public").expect("asset folder");
//!
//!   HttpServer::new(move || {
//!     App::new()
//!       .app_data(web::Data::new(views.clone()))
//!       .route("/", web::get().to(index))
//!       .configure(|cfg| assets.configure(cfg))
//!   })
//!   .bind(("127.0.0.1", 3000))?
//!   .run()
//!   .await
//! }
//! ```
//!
//! ### Shipping templates inside the binary
//!
//! Derive `rust_embed::RustEmbed` for the template folder and build the
//! store from [`TemplateSource::embedded`], or use [`TemplateSource::detect`]
//! to prefer the directory when it exists.

pub mod actix;
pub mod core;
pub mod error;

pub use crate::actix::StaticAssets;
pub use crate::core::app::{Template, TeraViews, TeraViewsBuilder};
pub use crate::core::assets::{AssetServer, BuildTimestamp};
pub use crate::core::source::{DirSource, Snapshot, TemplateSource};
pub use crate::core::syntax::Delimiters;
pub use crate::error::{EmberViewError, Result};

pub use tera;
