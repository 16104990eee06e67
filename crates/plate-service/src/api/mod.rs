pub mod routes;

use crate::state::PlateServiceState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use common::validation::MAX_UPLOAD_BYTES;
use tower_http::trace::TraceLayer;

/// Build the API router
pub fn router(state: PlateServiceState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        // Health and metrics endpoints
        .route("/healthz", get(routes::healthz))
        .route("/readyz", get(routes::readyz))
        .route("/metrics", get(routes::metrics))
        // Detection endpoints
        .route("/api/ocr-local", post(routes::ocr_local))
        .route("/api/ocr", post(routes::ocr_raw))
        // Pending review queue
        .route(
            "/api/pendientes",
            get(routes::list_pending).post(routes::add_pending),
        )
        .route(
            "/api/pendientes/:placa/procesado",
            post(routes::resolve_pending),
        )
        // Statistics
        .route("/api/stats", get(routes::get_stats))
        .route("/api/reset-stats", post(routes::reset_stats))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
