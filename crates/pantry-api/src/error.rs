//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::{JsonRejection, QueryRejection},
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use pantry_core::{DomainError, ValidationError};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  NotFound(String),

  #[error("{message}")]
  BadRequest {
    message: String,
    /// The payload field the message concerns, if any.
    field:   Option<&'static str>,
  },

  #[error("{0}")]
  Forbidden(String),

  #[error("authentication credentials were not provided or are invalid")]
  Unauthorized,

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn bad_request(message: impl Into<String>) -> Self {
    Self::BadRequest { message: message.into(), field: None }
  }

  /// Map a store backend error, keeping domain rejections visible to the
  /// client and hiding everything else behind a 500.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + DomainError + Send + Sync + 'static,
  {
    match e.as_domain() {
      Some(domain) => Self::from(domain),
      None => Self::Internal(Box::new(e)),
    }
  }
}

impl From<&pantry_core::Error> for ApiError {
  fn from(e: &pantry_core::Error) -> Self {
    use pantry_core::Error as E;
    match e {
      E::Validation(v) => Self::from(v.clone()),
      E::NotFound { .. } => Self::NotFound(e.to_string()),
      E::Forbidden => Self::Forbidden(e.to_string()),
      E::Conflict(_) | E::SelfSubscribe | E::AlreadyRemoved(_) => {
        Self::bad_request(e.to_string())
      }
      E::Serialization(_) => Self::Internal(e.to_string().into()),
    }
  }
}

impl From<pantry_core::Error> for ApiError {
  fn from(e: pantry_core::Error) -> Self { Self::from(&e) }
}

impl From<ValidationError> for ApiError {
  fn from(e: ValidationError) -> Self {
    Self::BadRequest { message: e.to_string(), field: Some(e.field()) }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(e: JsonRejection) -> Self { Self::bad_request(e.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(e: QueryRejection) -> Self { Self::bad_request(e.body_text()) }
}

impl From<std::io::Error> for ApiError {
  fn from(e: std::io::Error) -> Self { Self::Internal(Box::new(e)) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "error": m })),
      ApiError::BadRequest { message, field: Some(field) } => {
        (StatusCode::BAD_REQUEST, json!({ "error": message, "field": field }))
      }
      ApiError::BadRequest { message, field: None } => {
        (StatusCode::BAD_REQUEST, json!({ "error": message }))
      }
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, json!({ "error": m })),
      ApiError::Unauthorized => {
        let mut res =
          (StatusCode::UNAUTHORIZED, Json(json!({ "error": self.to_string() })))
            .into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"pantry\""),
        );
        return res;
      }
      ApiError::Internal(e) => {
        tracing::error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "internal server error" }))
      }
    };
    (status, Json(body)).into_response()
  }
}
