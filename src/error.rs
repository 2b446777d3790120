use std::time::Duration;

use axum::{
  response::{IntoResponse, Response},
  Json,
};
use reqwest::StatusCode;
use serde_json::json;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("missing `url` query parameter")]
  MissingUrl,
  #[error("not an absolute http(s) url: {0}")]
  InvalidUrl(String),
  #[error("unsupported platform for url: {0}")]
  UnsupportedPlatform(String),
  #[error("no media found for {0}")]
  NoMediaFound(String),
  #[error("too many requests, slow down")]
  RateLimited,
  #[error("not found")]
  NotFound,

  // provider-local failures, absorbed by the resolver
  #[error("{provider} timed out after {timeout:?}")]
  UpstreamTimeout { provider: String, timeout: Duration },
  #[error("{provider}: {reason}")]
  Provider { provider: String, reason: String },
  #[error(transparent)]
  Http(#[from] reqwest::Error),
  #[error(transparent)]
  Response(#[from] axum::http::Error),

  #[error("invalid configuration: {0}")]
  Config(String),
}

impl Error {
  pub fn provider(provider: &str, reason: impl Into<String>) -> Self {
    Error::Provider {
      provider: provider.to_owned(),
      reason: reason.into(),
    }
  }

  pub fn code(&self) -> &'static str {
    match self {
      Error::MissingUrl => "MissingUrl",
      Error::InvalidUrl(_) => "InvalidUrl",
      Error::UnsupportedPlatform(_) => "UnsupportedPlatform",
      Error::NoMediaFound(_) => "NoMediaFound",
      Error::RateLimited => "RateLimited",
      Error::NotFound => "NotFound",
      Error::Http(_) => "UpstreamError",
      Error::UpstreamTimeout { .. }
      | Error::Provider { .. }
      | Error::Response(_)
      | Error::Config(_) => "InternalError",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Error::MissingUrl
      | Error::InvalidUrl(_)
      | Error::UnsupportedPlatform(_) => StatusCode::BAD_REQUEST,
      Error::NoMediaFound(_) | Error::NotFound => StatusCode::NOT_FOUND,
      Error::RateLimited => StatusCode::TOO_MANY_REQUESTS,
      Error::Http(_) => StatusCode::BAD_GATEWAY,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
      tracing::error!(error = %self, "internal error");
      "internal server error".to_owned()
    } else {
      self.to_string()
    };

    let body = json!({
      "ok": false,
      "error": self.code(),
      "message": message,
    });

    (status, Json(body)).into_response()
  }
}
