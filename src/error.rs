use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Unified error type for the Postern application
#[derive(Error, Debug)]
pub enum PosternError {
    // Target resolution errors
    #[error("Invalid target URL: {0}")]
    InvalidTarget(String),

    // Upstream errors
    #[error("Upstream request timed out")]
    Timeout,

    #[error("Too many redirects (limit is {limit})")]
    TooManyRedirects { limit: usize },

    #[error("Upstream returned HTTP {status}")]
    UpstreamStatus { status: u16 },

    #[error("Could not reach upstream: {0}")]
    Network(String),

    // Tunnel errors
    #[error("Tunnel error: {0}")]
    TunnelError(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Postern operations
pub type Result<T> = std::result::Result<T, PosternError>;

impl PosternError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            PosternError::InvalidTarget(_) | PosternError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }

            // 404 Not Found
            PosternError::NotFound(_) => StatusCode::NOT_FOUND,

            // 502 Bad Gateway: upstream unreachable or misbehaving
            PosternError::Timeout
            | PosternError::TooManyRedirects { .. }
            | PosternError::Network(_)
            | PosternError::TunnelError(_) => StatusCode::BAD_GATEWAY,

            // Upstream answered with an error status: mirror it so the
            // status code stays a faithful machine-readable side channel.
            PosternError::UpstreamStatus { status } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }

            // 500 Internal Server Error
            PosternError::InvalidConfig(_)
            | PosternError::Io(_)
            | PosternError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

// Implement IntoResponse for JSON error responses (API surfaces).
// Proxied page errors render through the error page builder instead.
impl IntoResponse for PosternError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "error": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for PosternError {
    fn from(err: url::ParseError) -> Self {
        PosternError::InvalidTarget(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_code_mapping() {
        assert_eq!(
            PosternError::InvalidTarget("ftp://x".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PosternError::InvalidRequest("bad".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(PosternError::Timeout.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            PosternError::TooManyRedirects { limit: 10 }.status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            PosternError::Network("refused".to_string()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            PosternError::NotFound("route".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_upstream_status_is_mirrored() {
        assert_eq!(
            PosternError::UpstreamStatus { status: 404 }.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            PosternError::UpstreamStatus { status: 503 }.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        // Nonsense status degrades to 502 instead of panicking
        assert_eq!(
            PosternError::UpstreamStatus { status: 42 }.status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_error_client_server_helpers() {
        assert!(PosternError::InvalidTarget("bad".to_string()).is_client_error());
        assert!(!PosternError::InvalidTarget("bad".to_string()).is_server_error());

        assert!(PosternError::Timeout.is_server_error());
        assert!(!PosternError::Timeout.is_client_error());
    }
}
