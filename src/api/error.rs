//! HTTP error responses.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::backend::BackendError;
use crate::engine::TTSError;
use crate::voice::VoiceError;

const INTERNAL_DETAIL: &str = "Internal server error";

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

/// An error rendered as `{"detail": ...}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }

    pub fn bad_gateway(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, detail)
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, detail)
    }

    /// Log `cause` and hide it behind a generic 500.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        error!(error = %cause, "Unhandled error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_DETAIL)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            detail: self.detail,
        });
        (self.status, body).into_response()
    }
}

impl From<VoiceError> for ApiError {
    fn from(err: VoiceError) -> Self {
        match err {
            VoiceError::NotFound(_) => Self::not_found(err.to_string()),
            VoiceError::Invalid(detail) => Self::unprocessable(detail),
            VoiceError::Audio(_) | VoiceError::InvalidTransition { .. } => {
                Self::bad_request(err.to_string())
            }
            VoiceError::AudioNotFound(_)
            | VoiceError::Database(_)
            | VoiceError::IoError(_)
            | VoiceError::SerializationError(_) => Self::internal(err),
        }
    }
}

impl From<TTSError> for ApiError {
    fn from(err: TTSError) -> Self {
        match err {
            TTSError::VoiceNotFound(_) => Self::not_found(err.to_string()),
            TTSError::VoiceNotReady(_) => Self::bad_request(err.to_string()),
            TTSError::AudioPath(detail) => {
                error!(error = %detail, "Reference audio unavailable");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
            }
            // Rejected before dispatch
            TTSError::BackendError(BackendError::Validation(detail)) => {
                Self::unprocessable(detail)
            }
            TTSError::BackendError(e) => {
                error!(error = %e, "TTS synthesis failed");
                Self::bad_gateway(format!("TTS service error: {e}"))
            }
            TTSError::VoiceError(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonSyntaxError(_) | JsonRejection::MissingJsonContentType(_) => {
                Self::bad_request(rejection.body_text())
            }
            _ => Self::unprocessable(rejection.body_text()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::unprocessable(rejection.body_text())
    }
}
