use crate::error::{ApiError, RawOcrError};
use crate::pipeline::FailureKind;
use crate::state::PlateServiceState;
use axum::{
    body::Bytes,
    extract::{
        multipart::{Multipart, MultipartError, MultipartRejection},
        rejection::JsonRejection,
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::plates::{AddPendingRequest, MessageResponse, PendingDocument};
use common::validation::validate_upload_size;
use serde_json::json;

const IMAGE_FIELD: &str = "image";
const MESSAGE_NO_IMAGE: &str = "No se proporcionó imagen";
const MESSAGE_EMPTY_FILE: &str = "Archivo vacío";

/// Service banner
pub async fn index() -> impl IntoResponse {
    Json(json!({ "ok": true, "service": "plate-service" }))
}

/// Health check endpoint
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "plate-service"
        })),
    )
}

/// Readiness check endpoint
pub async fn readyz(State(state): State<PlateServiceState>) -> impl IntoResponse {
    match state.engine_info().await {
        Some(engine) if engine.healthy => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "engine": engine
            })),
        ),
        engine => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not ready",
                "engine": engine
            })),
        ),
    }
}

/// Metrics endpoint (Prometheus format)
pub async fn metrics() -> Response {
    match telemetry::metrics::encode_metrics() {
        Ok(body) => body.into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

/// Detect a Guanajuato plate in an uploaded image
pub async fn ocr_local(
    State(state): State<PlateServiceState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let pipeline = state.pipeline().ok_or(ApiError::EngineUnavailable)?;
    let bytes = read_image_field(multipart).await?;

    let output = pipeline.process_upload(&bytes).await;
    let status = match output.failure {
        Some(FailureKind::Decode) => StatusCode::BAD_REQUEST,
        Some(FailureKind::Engine) | None => StatusCode::OK,
    };

    Ok((status, Json(output.result)).into_response())
}

/// Every text line the engine reads, without plate validation
pub async fn ocr_raw(
    State(state): State<PlateServiceState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, RawOcrError> {
    let pipeline = state.pipeline().ok_or(ApiError::EngineUnavailable)?;
    let bytes = read_image_field(multipart).await?;

    let response = pipeline.recognize_raw(&bytes).await.map_err(|e| {
        tracing::warn!("Raw recognition failed: {:#}", e);
        ApiError::internal(format!("{:#}", e))
    })?;

    Ok(Json(response).into_response())
}

pub async fn list_pending(State(state): State<PlateServiceState>) -> Json<PendingDocument> {
    Json(PendingDocument {
        data: state.pending().list().await,
    })
}

pub async fn add_pending(
    State(state): State<PlateServiceState>,
    body: Result<Json<AddPendingRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = body?;
    let plate = request.plate.unwrap_or_default();
    let image_reference = request.image_reference.unwrap_or_default();

    let entry = state.pending().add(&plate, &image_reference).await?;
    Ok(Json(MessageResponse::new(format!(
        "Placa {} agregada a pendientes",
        entry.plate
    ))))
}

pub async fn resolve_pending(
    State(state): State<PlateServiceState>,
    Path(plate): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let entry = state.pending().resolve(&plate).await?;
    Ok(Json(MessageResponse::new(format!(
        "Placa {} marcada como procesada",
        entry.plate
    ))))
}

pub async fn get_stats(State(state): State<PlateServiceState>) -> impl IntoResponse {
    Json(state.stats().snapshot().await)
}

pub async fn reset_stats(State(state): State<PlateServiceState>) -> Json<MessageResponse> {
    state.stats().reset().await;
    Json(MessageResponse::new("Estadísticas reiniciadas"))
}

/// Pull the `image` part out of a multipart upload
async fn read_image_field(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Bytes, ApiError> {
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!("Rejected upload: {}", rejection.body_text());
        ApiError::bad_request(MESSAGE_NO_IMAGE)
    })?;

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        if field.file_name() == Some("") {
            return Err(ApiError::bad_request(MESSAGE_EMPTY_FILE));
        }

        let bytes = field.bytes().await.map_err(upload_error)?;
        if bytes.is_empty() {
            return Err(ApiError::bad_request(MESSAGE_EMPTY_FILE));
        }
        validate_upload_size(bytes.len()).map_err(|_| ApiError::PayloadTooLarge)?;
        return Ok(bytes);
    }

    Err(ApiError::bad_request(MESSAGE_NO_IMAGE))
}

fn upload_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::bad_request(err.body_text())
    }
}
