/// Integration tests for the plate service HTTP API
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use common::plates::{
    BoundingBox, DetectionResult, MessageResponse, PendingDocument, RawDetection, RawOcrResponse,
    StatsSnapshot, VehicleType,
};
use image::{ImageFormat, RgbImage};
use plate_service::{
    api,
    engine::{
        scripted::{ScriptedEngine, ScriptedResponse},
        shared,
    },
    PendingQueue, PlateServiceState,
};
use serde_json::json;
use std::io::Cursor;
use tempfile::TempDir;

fn det(text: &str, confidence: f32) -> RawDetection {
    RawDetection::new(
        BoundingBox {
            x: 4,
            y: 4,
            width: 40,
            height: 12,
        },
        text,
        confidence,
    )
}

fn png() -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 16, image::Rgb([240, 240, 240])))
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn upload(bytes: Vec<u8>) -> MultipartForm {
    MultipartForm::new().add_part(
        "image",
        Part::bytes(bytes)
            .file_name("placa.png")
            .mime_type("image/png"),
    )
}

/// Helper to create a test server around a scripted engine
fn setup(engine: Option<ScriptedEngine>) -> (TestServer, TempDir) {
    let dir = TempDir::new().unwrap();
    let pending = PendingQueue::new(dir.path().join("pendientes.json"));
    let state = PlateServiceState::new(engine.map(shared), pending);
    let server = TestServer::new(api::router(state)).unwrap();
    (server, dir)
}

#[tokio::test]
async fn test_index_and_health() {
    let (server, _dir) = setup(Some(ScriptedEngine::new()));

    let response = server.get("/").await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["ok"], true);

    assert_eq!(server.get("/healthz").await.status_code(), 200);

    let ready = server.get("/readyz").await;
    assert_eq!(ready.status_code(), 200);
    let body: serde_json::Value = ready.json();
    assert_eq!(body["engine"]["id"], "scripted");
    assert_eq!(
        body["engine"]["config_schema"]["properties"]["responses"]["type"],
        "array"
    );
}

#[tokio::test]
async fn test_ocr_local_detects_plate() {
    let (server, _dir) = setup(Some(ScriptedEngine::with_detections(vec![
        det("GUANAJUATO", 0.9),
        det("ab1234c", 0.95),
        det("ABC-123-D", 0.61),
    ])));

    let response = server.post("/api/ocr-local").multipart(upload(png())).await;
    assert_eq!(response.status_code(), 200);

    let result: DetectionResult = response.json();
    assert!(result.success);
    assert_eq!(result.plate.as_deref(), Some("ABC-123-D"));
    assert_eq!(result.text, "ABC123D");
    assert_eq!(result.vehicle_type, Some(VehicleType::Auto));
    assert_eq!(result.all_candidates, Some(2));

    let raw: serde_json::Value = server
        .post("/api/ocr-local")
        .multipart(upload(png()))
        .await
        .json();
    assert_eq!(raw["confidence_level"], "ALTA");
    assert_eq!(raw["vehicle_type"], "AUTO");
    assert!(raw.get("message").is_none());
}

#[tokio::test]
async fn test_ocr_local_reports_non_plate_text() {
    let (server, _dir) = setup(Some(ScriptedEngine::with_detections(vec![det(
        "HOLA MUNDO",
        0.88,
    )])));

    let response = server.post("/api/ocr-local").multipart(upload(png())).await;
    assert_eq!(response.status_code(), 200);

    let result: DetectionResult = response.json();
    assert!(!result.success);
    assert_eq!(result.text, "HOLA MUNDO");
    assert_eq!(
        result.message.as_deref(),
        Some("Texto detectado pero no es placa válida de Guanajuato")
    );
}

#[tokio::test]
async fn test_ocr_local_without_image_field() {
    let (server, _dir) = setup(Some(ScriptedEngine::new()));

    let form = MultipartForm::new().add_text("other", "value");
    let response = server.post("/api/ocr-local").multipart(form).await;
    assert_eq!(response.status_code(), 400);

    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "No se proporcionó imagen");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_ocr_local_with_empty_file() {
    let (server, _dir) = setup(Some(ScriptedEngine::new()));

    let response = server
        .post("/api/ocr-local")
        .multipart(upload(Vec::new()))
        .await;
    assert_eq!(response.status_code(), 400);

    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Archivo vacío");
}

#[tokio::test]
async fn test_ocr_local_with_undecodable_file() {
    let (server, _dir) = setup(Some(ScriptedEngine::with_detections(vec![det(
        "ABC123D", 0.9,
    )])));

    let response = server
        .post("/api/ocr-local")
        .multipart(upload(b"this is not a png".to_vec()))
        .await;
    assert_eq!(response.status_code(), 400);

    let result: DetectionResult = response.json();
    assert!(!result.success);
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .starts_with("Error procesando imagen"));

    let stats: StatsSnapshot = server.get("/api/stats").await.json();
    assert_eq!(stats.total_processed, 1);
    assert_eq!(stats.successful_detections, 0);
}

#[tokio::test]
async fn test_engine_fault_is_a_failed_result() {
    let (server, _dir) = setup(Some(ScriptedEngine::failing("inference crashed")));

    let response = server.post("/api/ocr-local").multipart(upload(png())).await;
    assert_eq!(response.status_code(), 200);

    let result: DetectionResult = response.json();
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("inference crashed"));
}

#[tokio::test]
async fn test_engine_unavailable() {
    let (server, _dir) = setup(None);

    let response = server.post("/api/ocr-local").multipart(upload(png())).await;
    assert_eq!(response.status_code(), 500);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "motor OCR no disponible");

    assert_eq!(server.get("/readyz").await.status_code(), 503);

    // Pending queue and stats keep working without an engine
    assert_eq!(server.get("/api/stats").await.status_code(), 200);
    assert_eq!(server.get("/api/pendientes").await.status_code(), 200);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let (server, _dir) = setup(Some(ScriptedEngine::new()));

    let response = server
        .post("/api/ocr-local")
        .multipart(upload(vec![0u8; 17 * 1024 * 1024]))
        .await;
    assert_eq!(response.status_code(), 413);

    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Archivo demasiado grande");

    let stats: StatsSnapshot = server.get("/api/stats").await.json();
    assert_eq!(stats.total_processed, 0);
}

#[tokio::test]
async fn test_raw_ocr_lists_every_line() {
    let (server, _dir) = setup(Some(ScriptedEngine::with_detections(vec![
        det("GTO", 0.5),
        det("XYZ 999", 0.93),
    ])));

    let response = server.post("/api/ocr").multipart(upload(png())).await;
    assert_eq!(response.status_code(), 200);

    let raw: RawOcrResponse = response.json();
    assert!(raw.ok);
    assert_eq!(raw.items.len(), 2);
    assert_eq!(raw.best.text, "XYZ 999");

    let stats: StatsSnapshot = server.get("/api/stats").await.json();
    assert_eq!(stats.total_processed, 0);
}

#[tokio::test]
async fn test_raw_ocr_failures_use_ok_flag() {
    let (server, _dir) = setup(Some(ScriptedEngine::new()));

    let missing = server
        .post("/api/ocr")
        .multipart(MultipartForm::new().add_text("other", "value"))
        .await;
    assert_eq!(missing.status_code(), 400);
    let body: serde_json::Value = missing.json();
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "No se proporcionó imagen");
    assert!(body.get("success").is_none());

    let garbage = server
        .post("/api/ocr")
        .multipart(upload(b"not an image".to_vec()))
        .await;
    assert_eq!(garbage.status_code(), 500);
    let body: serde_json::Value = garbage.json();
    assert_eq!(body["ok"], false);
    assert!(body["error"].as_str().unwrap().contains("decode"));

    let (server, _dir) = setup(None);
    let unavailable = server.post("/api/ocr").multipart(upload(png())).await;
    assert_eq!(unavailable.status_code(), 500);
    let body: serde_json::Value = unavailable.json();
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "motor OCR no disponible");
}

#[tokio::test]
async fn test_stats_and_reset() {
    let (server, _dir) = setup(Some(ScriptedEngine::with_responses(vec![
        ScriptedResponse::Detections(vec![det("ABC123D", 0.9)]),
        ScriptedResponse::Detections(vec![det("DEF456", 0.8)]),
        ScriptedResponse::Detections(vec![det("AB1234C", 0.7)]),
        ScriptedResponse::Detections(vec![det("NADA", 0.9)]),
        ScriptedResponse::Detections(vec![]),
    ])));

    for _ in 0..5 {
        server.post("/api/ocr-local").multipart(upload(png())).await;
    }

    let stats: StatsSnapshot = server.get("/api/stats").await.json();
    assert_eq!(stats.total_processed, 5);
    assert_eq!(stats.successful_detections, 3);
    assert_eq!(stats.auto_plates, 2);
    assert_eq!(stats.camioneta_plates, 1);
    assert_eq!(stats.success_rate, 60.0);

    let reset = server.post("/api/reset-stats").await;
    assert_eq!(reset.status_code(), 200);
    let msg: MessageResponse = reset.json();
    assert_eq!(msg.msg, "Estadísticas reiniciadas");

    let stats: StatsSnapshot = server.get("/api/stats").await.json();
    assert_eq!(stats, StatsSnapshot::default());
}

#[tokio::test]
async fn test_pending_queue_flow() {
    let (server, dir) = setup(Some(ScriptedEngine::new()));

    let empty: PendingDocument = server.get("/api/pendientes").await.json();
    assert!(empty.data.is_empty());

    let added = server
        .post("/api/pendientes")
        .json(&json!({ "placa": " abc123d ", "imagen": "captura-01.jpg" }))
        .await;
    assert_eq!(added.status_code(), 200);
    let msg: MessageResponse = added.json();
    assert_eq!(msg.msg, "Placa ABC123D agregada a pendientes");

    let duplicate = server
        .post("/api/pendientes")
        .json(&json!({ "placa": "ABC123D" }))
        .await;
    assert_eq!(duplicate.status_code(), 400);
    let msg: MessageResponse = duplicate.json();
    assert_eq!(msg.msg, "La placa ABC123D ya está en pendientes");

    let listed: PendingDocument = server.get("/api/pendientes").await.json();
    assert_eq!(listed.data.len(), 1);
    assert_eq!(listed.data[0].plate, "ABC123D");
    assert_eq!(listed.data[0].image_reference, "captura-01.jpg");
    assert!(!listed.data[0].resolved);

    let resolved = server.post("/api/pendientes/abc123d/procesado").await;
    assert_eq!(resolved.status_code(), 200);
    let listed: PendingDocument = server.get("/api/pendientes").await.json();
    assert!(listed.data[0].resolved);

    let unknown = server.post("/api/pendientes/ZZZ999/procesado").await;
    assert_eq!(unknown.status_code(), 404);

    // Survives a fresh queue over the same file
    let reopened = PendingQueue::new(dir.path().join("pendientes.json"));
    assert_eq!(reopened.list().await.len(), 1);
}

#[tokio::test]
async fn test_pending_requires_plate() {
    let (server, _dir) = setup(Some(ScriptedEngine::new()));

    for body in [json!({}), json!({ "placa": "" }), json!({ "placa": "   " })] {
        let response = server.post("/api/pendientes").json(&body).await;
        assert_eq!(response.status_code(), 400);
        let msg: MessageResponse = response.json();
        assert_eq!(msg.msg, "Placa requerida");
    }

    let malformed = server.post("/api/pendientes").text("placa=ABC123").await;
    assert_eq!(malformed.status_code(), 400);

    let listed: PendingDocument = server.get("/api/pendientes").await.json();
    assert!(listed.data.is_empty());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (server, _dir) = setup(Some(ScriptedEngine::with_detections(vec![det(
        "ABC123D", 0.9,
    )])));
    server.post("/api/ocr-local").multipart(upload(png())).await;

    let response = server.get("/metrics").await;
    assert_eq!(response.status_code(), 200);
    assert!(response.text().contains("plate_images_processed_total"));
}
