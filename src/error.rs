//! Error types for azrelay.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

/// Body returned when the inbound credential is missing or wrong.
pub const FORBIDDEN_BODY: &str = "Not allowed: Key Error";

/// Body returned for paths outside the routing table.
pub const NOT_FOUND_BODY: &str = "404 Not Found";

/// Result type alias for azrelay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for azrelay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Not found")]
    NotFound,

    #[error("Authorization header missing or does not match")]
    Forbidden,

    #[error("Request body is not valid JSON: {0}")]
    MalformedBody(#[source] serde_json::Error),

    #[error("Request does not name a model")]
    MissingModel,

    #[error("Upstream response has no body")]
    UpstreamBodyMissing,

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status reported to the client for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::MissingModel => StatusCode::BAD_REQUEST,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_)
            | Error::MalformedBody(_)
            | Error::UpstreamBodyMissing
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        // Routing misses and auth failures keep their fixed plain-text bodies
        let fixed = match &self {
            Error::NotFound => Some(NOT_FOUND_BODY),
            Error::Forbidden => Some(FORBIDDEN_BODY),
            _ => None,
        };
        if let Some(text) = fixed {
            return (
                status,
                [(header::CONTENT_TYPE, "text/plain;charset=UTF-8")],
                text,
            )
                .into_response();
        }

        // Return OpenAI-compatible error format
        let body = serde_json::json!({
            "error": {
                "message": self.to_string(),
                "type": "azrelay_error",
                "code": status.as_u16()
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
