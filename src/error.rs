//! Error types with HTTP status code mapping.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

/// Error type for gangway operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Domain errors raised by exposed functions
    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    DuplicateRecord(String),

    // Request errors
    #[error("{0}")]
    Input(String),

    #[error("Unsupported content type {actual:?}: expected {expected}")]
    ContentTypeMismatch { expected: String, actual: String },

    // Bind-time errors
    #[error("Config {key} does not match type {expected}")]
    ConfigType { key: String, expected: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("HTTP method {method} already exists for path {path}")]
    DuplicatePathMethod { path: String, method: String },

    #[error("Configuration error: {0}")]
    Config(String),

    // System errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Binary codec error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map error to HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Client-facing errors -> 4xx
            Error::Authorization(_) | Error::Input(_) | Error::DuplicateRecord(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::ContentTypeMismatch { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,

            // Bind-time errors -> 500 (shouldn't happen at runtime)
            Error::ConfigType { .. }
            | Error::Schema(_)
            | Error::DuplicatePathMethod { .. }
            | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // System errors -> 500
            Error::Io(_)
            | Error::Json(_)
            | Error::Bincode(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Name of the error kind, sent back as the `X-Error-Type` header.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Authorization(_) => "AuthorizationError",
            Error::Forbidden(_) => "ForbiddenError",
            Error::NotFound(_) => "NotFoundError",
            Error::DuplicateRecord(_) => "DuplicateRecordError",
            Error::Input(_) => "InputError",
            Error::ContentTypeMismatch { .. } => "ContentTypeMismatch",
            Error::ConfigType { .. } => "ConfigTypeError",
            Error::Schema(_) => "SchemaError",
            Error::DuplicatePathMethod { .. } => "DuplicatePathMethod",
            _ => "InternalError",
        }
    }

    /// True for the domain and request errors a caller can act on.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Convert error into HTTP response.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!("Internal error: {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        crate::response::error(status, self.kind(), &message)
    }
}

/// Result type alias using gangway's Error.
pub type Result<T> = std::result::Result<T, Error>;
