use crate::pending::PendingError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub const MESSAGE_TOO_LARGE: &str = "Archivo demasiado grande";
pub const MESSAGE_ENGINE_UNAVAILABLE: &str = "motor OCR no disponible";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("payload too large")]
    PayloadTooLarge,

    #[error("engine unavailable")]
    EngineUnavailable,

    #[error("internal error: {0}")]
    Internal(String),

    /// Pending queue failures answer with `{msg}` like the rest of that API
    #[error(transparent)]
    Pending(#[from] PendingError),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::EngineUnavailable | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Pending(err) => match err {
                PendingError::InvalidInput(_) | PendingError::Duplicate(_) => {
                    StatusCode::BAD_REQUEST
                }
                PendingError::NotFound(_) => StatusCode::NOT_FOUND,
                PendingError::Storage => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Client-facing text, without the variant prefix
    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) | ApiError::Internal(msg) => msg.clone(),
            ApiError::PayloadTooLarge => MESSAGE_TOO_LARGE.to_string(),
            ApiError::EngineUnavailable => MESSAGE_ENGINE_UNAVAILABLE.to_string(),
            ApiError::Pending(err) => err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.message();
        let body = match &self {
            ApiError::PayloadTooLarge => json!({ "error": message }),
            ApiError::Pending(_) => json!({ "msg": message }),
            _ => json!({ "success": false, "error": message }),
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Failures of the raw OCR route, which answers `{ok:false,error}`
#[derive(Debug, Error)]
#[error(transparent)]
pub struct RawOcrError(#[from] pub ApiError);

impl IntoResponse for RawOcrError {
    fn into_response(self) -> Response {
        let body = json!({ "ok": false, "error": self.0.message() });
        (self.0.status(), Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::internal(err.to_string())
    }
}

/// Malformed or missing pending bodies are the caller's fault
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected pending body: {}", rejection.body_text());
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge;
        }
        ApiError::Pending(PendingError::InvalidInput("Placa requerida".to_string()))
    }
}
