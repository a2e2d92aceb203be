use actix_web::{App, HttpRequest, HttpServer, Responder, web};
use emberview::tera::Context;
use emberview::{Snapshot, StaticAssets, TemplateSource, TeraViews};
use rust_embed::RustEmbed;

/// The views folder, baked into release binaries.
#[derive(RustEmbed)]
#[folder = "views/"]
struct Views;

#[derive(serde::Serialize)]
struct User {
  name: String,
  email: String,
  admin: bool,
}

/// Renders the home page.
async fn index(views: web::Data<TeraViews>) -> impl Responder {
  let mut context = Context::new();
  context.insert("page_title", "Home");
  context.insert("message", "Welcome to the EmberView demo site!");
  views.render("index", context).layout("layouts/main")
}

/// Renders a page with more complex context.
async fn user_profile(views: web::Data<TeraViews>) -> impl Responder {
  let mut context = Context::new();
  context.insert("page_title", "User Profile");
  context.insert(
    "user",
    &User {
      name: "Alice".to_string(),
      email: "alice@example.com".to_string(),
      admin: true,
    },
  );
  views.render("user", context).layout("layouts/main")
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  // Initialize logging
  env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

  // Live templates when run from the crate directory, embedded ones otherwise.
  let views_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("views");
  let source = TemplateSource::detect(&views_dir, Some(Snapshot::from_embed::<Views>()))?;

  let views = TeraViews::builder(source)
    .add_global("site_name", "EmberView Demo")
    .add_global("version", env!("CARGO_PKG_VERSION"))
    .build()?;
  views.load()?;

  let assets = StaticAssets::new(&views, "/static", "public")?;
  let shell_views = views.clone();
  // Anything else is a client-side route of the single-page app.
  let app_shell = StaticAssets::new(&views, "/", "public")?.fallback(move |req: HttpRequest| {
    let views = shell_views.clone();
    async move {
      let mut context = Context::new();
      context.insert("page_title", "App");
      context.insert("path", req.path());
      Ok(views.render("app", context).layout("layouts/main").respond_to(&req))
    }
  });

  log::info!("🚀 Starting server at http://127.0.0.1:3000");

  HttpServer::new(move || {
    App::new()
      .app_data(web::Data::new(views.clone()))
      .route("/", web::get().to(index))
      .route("/profile", web::get().to(user_profile))
      .configure(|cfg| assets.configure(cfg))
      .configure(|cfg| app_shell.configure(cfg))
  })
  .bind(("127.0.0.1", 3000))?
  .run()
  .await?;
  Ok(())
}
