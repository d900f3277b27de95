use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors surfaced by the HTTP endpoints.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Internal(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(m) | Self::Internal(m) => write!(f, "{m}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = match &self {
            Self::NotFound(m) => serde_json::json!({ "error": "Not Found", "message": m }),
            Self::Internal(m) => serde_json::json!({
                "status": "unhealthy",
                "error": m,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }),
        };
        let status = match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(body)).into_response()
    }
}

/// Failures of the persistent player store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached.
    Unavailable(String),
    /// The update would violate a schema rule; nothing was written.
    Validation(String),
    /// A stored document could not be decoded.
    Corrupt(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(m) => write!(f, "store unavailable: {m}"),
            Self::Validation(m) => write!(f, "validation failed: {m}"),
            Self::Corrupt(m) => write!(f, "corrupt document: {m}"),
        }
    }
}

impl std::error::Error for StoreError {}
