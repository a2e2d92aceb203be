#![allow(dead_code)]

use actix_web::{HttpResponse, Responder, web};
use emberview::TeraViews;
use emberview::tera::Context;

// Renders the index page inside the main layout
pub async fn page_handler(views: web::Data<TeraViews>) -> impl Responder {
  let mut context = Context::new();
  context.insert("page_title", "Integration Test");
  views.render("index", context).layout("layouts/main")
}

// Renders a template that does not exist
pub async fn missing_handler(views: web::Data<TeraViews>) -> impl Responder {
  views.render("nowhere", Context::new())
}

// Stands in for a single-page app's entry point
pub async fn app_shell() -> actix_web::Result<HttpResponse> {
  Ok(HttpResponse::Ok().content_type("text/html").body("app shell"))
}
