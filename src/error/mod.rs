use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Relay error types
///
/// Error bodies are plain text so that browser-based callers can surface
/// them directly; every error response also carries the permissive CORS
/// header set.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Unauthorized: Missing or invalid Authorization header")]
    MissingCredentials,

    #[error("Unauthorized: Invalid token")]
    InvalidToken,

    #[error("Usage: ?url=https://example.com")]
    MissingTarget,

    #[error("Invalid target URL: {0}")]
    InvalidTarget(String),

    #[error("Proxy Error: {0}")]
    Upstream(String),

    #[error("Proxy Error: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MissingCredentials => StatusCode::UNAUTHORIZED,
            RelayError::InvalidToken => StatusCode::UNAUTHORIZED,
            RelayError::MissingTarget => StatusCode::BAD_REQUEST,
            RelayError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            RelayError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            RelayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, self.to_string()).into_response();
        crate::cors::apply(response.headers_mut());
        response
    }
}
