use crate::core::app::Template;
use crate::error::EmberViewError;
use actix_web::{
  HttpRequest, HttpResponse, Responder, ResponseError,
  body::BoxBody,
  http::{StatusCode, header::ContentType},
};

mod assets;

pub use assets::StaticAssets;

impl Responder for Template {
  type Body = BoxBody;

  fn respond_to(self, _req: &HttpRequest) -> HttpResponse<Self::Body> {
    match self.render() {
      Ok(body) => HttpResponse::build(StatusCode::OK)
        .content_type(ContentType::html())
        .body(body),
      Err(e) => {
        log::error!("Template rendering error: {:?}", e);
        e.error_response()
      }
    }
  }
}

impl ResponseError for EmberViewError {
  fn status_code(&self) -> StatusCode {
    match self {
      Self::AssetNotFound(_) => StatusCode::NOT_FOUND,
      Self::AssetForbidden(_) => StatusCode::FORBIDDEN,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}
