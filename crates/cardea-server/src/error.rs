//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Maps the core taxonomy onto HTTP statuses and the structured
//! `{"error": {"code", "message"}}` body clients match on. Internal detail
//! is logged server-side and never echoed to the caller.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use cardea_core::{Error, ErrorCode};
use serde_json::json;

#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
  fn from(e: Error) -> ApiError {
    ApiError(e)
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let code = self.0.code();
    let status = match code {
      ErrorCode::Unauthenticated   => StatusCode::UNAUTHORIZED,
      ErrorCode::PermissionDenied  => StatusCode::FORBIDDEN,
      ErrorCode::InvalidArgument   => StatusCode::BAD_REQUEST,
      ErrorCode::NotFound          => StatusCode::NOT_FOUND,
      ErrorCode::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
      ErrorCode::AlreadyExists     => StatusCode::CONFLICT,
      ErrorCode::Internal          => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = match code {
      ErrorCode::Internal => {
        tracing::error!(error = %self.0, "internal error");
        "internal error".to_owned()
      }
      _ => self.0.to_string(),
    };

    let body = Json(json!({
      "error": { "code": code.as_str(), "message": message }
    }));

    let mut res = (status, body).into_response();
    if let Error::ResourceExhausted { retry_after_secs } = self.0
      && let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string())
    {
      res.headers_mut().insert(header::RETRY_AFTER, value);
    }
    res
  }
}
