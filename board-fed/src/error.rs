//! Error types and HTTP response conversion

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the federation engine, storage engine and ingest pipeline.
///
/// Variants map directly onto the propagation policy in the error handling design:
/// anonymous callers see only the class (via `ErrorResponse`), authenticated admins
/// see `detail` as well.
#[derive(Debug, Error)]
pub enum Error {
    /// Empty post, or content rejected by a regex filter.
    #[error("invalid content: {0}")]
    InvalidContent(String),

    /// Post, board, apid or report lookup failed.
    #[error("not found: {0}")]
    NotFound(String),

    /// HTTP signature missing or malformed.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// HTTP signature present but does not verify.
    #[error("bad signature: {0}")]
    BadSignature(String),

    /// Signature `Date` header is outside the replay window.
    #[error("stale date")]
    StaleDate,

    /// Incoming reply has no resolvable parent; the activity must be dropped, not 5xx'd.
    #[error("orphan reply: {0}")]
    OrphanReply(String),

    /// Apid uniqueness violated after the bounded mint-and-retry loop.
    #[error("conflict: {0}")]
    Conflict(String),

    /// WebFinger or outbound federation HTTP failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed actor URL passed to WebFinger.
    #[error("bad actor url: {0}")]
    BadFormat(String),

    /// WebFinger response had no usable ActivityPub link.
    #[error("no actor link: {0}")]
    NoActor(String),

    /// Board id, or other identifier, failed validation before touching SQL.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Storage engine failure (connection, transaction, schema upgrade).
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Configuration failed to load.
    #[error("configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Catch-all for unexpected internal failure (panics are recovered separately).
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

/// Error response body returned to HTTP clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub status: u16,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            status: status.as_u16(),
        }
    }

    pub fn with_code(status: StatusCode, code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: Some(code.into()),
            status: status.as_u16(),
        }
    }
}

impl Error {
    /// The HTTP status this error maps to, per the error handling design.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidContent(_) | Error::BadRequest(_) | Error::BadFormat(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) | Error::NoActor(_) => StatusCode::NOT_FOUND,
            Error::Unauthorized(_) | Error::BadSignature(_) | Error::StaleDate => StatusCode::FORBIDDEN,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Transport(_) => StatusCode::BAD_GATEWAY,
            // Handled specially by inbox callers (dropped + logged, never surfaced as a response).
            Error::OrphanReply(_) => StatusCode::OK,
            Error::Storage(_) | Error::Config(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Error::InvalidContent(_) => "INVALID_CONTENT",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Unauthorized(_) => "UNAUTHORIZED",
            Error::BadSignature(_) => "BAD_SIGNATURE",
            Error::StaleDate => "STALE_DATE",
            Error::OrphanReply(_) => "ORPHAN_REPLY",
            Error::Conflict(_) => "CONFLICT",
            Error::Transport(_) => "TRANSPORT_ERROR",
            Error::BadFormat(_) => "BAD_FORMAT",
            Error::NoActor(_) => "NO_ACTOR",
            Error::BadRequest(_) => "BAD_REQUEST",
            Error::Storage(_) => "STORAGE_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Response variant that includes the raw error text, for authenticated admin callers.
    pub fn detailed_response(self) -> axum::response::Response {
        let status = self.status_code();
        let code = self.code();
        let body = ErrorResponse::with_code(status, code, self.to_string());
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        match &self {
            Error::Storage(e) => tracing::error!(error = %e, "storage error"),
            Error::Internal(msg) => tracing::error!(%msg, "internal error"),
            Error::Unauthorized(msg) | Error::BadSignature(msg) => {
                tracing::warn!(%msg, "rejected unauthenticated request")
            }
            _ => {}
        }

        // Anonymous callers see only the class; admins call `detailed_response` instead.
        let body = ErrorResponse::with_code(status, self.code(), status.canonical_reason().unwrap_or("error"));
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_invalid_content_to_400() {
        let err = Error::InvalidContent("empty post".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn maps_bad_signature_to_403() {
        let err = Error::BadSignature("digest mismatch".into());
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn maps_internal_to_500() {
        let err = Error::Internal("tx rollback".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
