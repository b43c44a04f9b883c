use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::core::queue::QueueError;
use crate::core::voice::{ErrorKind, VoiceError};

/// Error returned by HTTP handlers as `{ "error": message, "kind": kind }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorKind::InvalidInput.as_str(), message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ErrorKind::NotFound.as_str(), message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            log::error!("Request failed ({}): {}", self.status, self.message);
        }
        (
            self.status,
            Json(serde_json::json!({
                "error": self.message,
                "kind": self.kind
            })),
        )
            .into_response()
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        let (status, kind) = match &err {
            QueueError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            QueueError::AlreadyTerminal { .. } => (StatusCode::CONFLICT, "already_terminal"),
            QueueError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            QueueError::QueueFull => (StatusCode::SERVICE_UNAVAILABLE, "queue_full"),
            QueueError::Shutdown => (StatusCode::SERVICE_UNAVAILABLE, "shutting_down"),
            QueueError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        };
        Self::new(status, kind, err.to_string())
    }
}

impl From<VoiceError> for ApiError {
    fn from(err: VoiceError) -> Self {
        let kind = err.kind();
        let status = match kind {
            ErrorKind::InvalidInput | ErrorKind::InvalidAudio | ErrorKind::InvalidParameter => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::LimitReached | ErrorKind::CapacityExhausted => StatusCode::CONFLICT,
            ErrorKind::ProviderError => StatusCode::BAD_GATEWAY,
            ErrorKind::StorageError | ErrorKind::Interrupted => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, kind.as_str(), err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::new(err.status(), ErrorKind::InvalidInput.as_str(), err.body_text())
    }
}
