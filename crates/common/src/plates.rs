//! Plate recognition contracts shared between the service and its clients.
//!
//! Wire names follow the documents the web client and the persisted pending
//! file already use (`placa`, `imagen`, `procesado`, ...), so existing
//! `pendientes.json` files keep loading.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bounding box coordinates in source-image pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One text line reported by a recognition engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// Region the text was read from; opaque to ranking
    pub region: BoundingBox,

    /// Text exactly as the engine produced it
    pub text: String,

    /// Engine confidence in [0, 1]
    pub confidence: f32,
}

impl RawDetection {
    pub fn new(region: BoundingBox, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            region,
            text: text.into(),
            confidence,
        }
    }
}

/// Vehicle category implied by the plate layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VehicleType {
    /// 3 letters + 3 digits [+ letter]
    Auto,
    /// 2 letters + 4 digits [+ letter]
    Camioneta,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Auto => "AUTO",
            VehicleType::Camioneta => "CAMIONETA",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How complete the matched plate is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    /// Full 7-character match including the trailing letter
    Alta,
    /// 6-character match missing the trailing letter
    Media,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Alta => "ALTA",
            ConfidenceLevel::Media => "MEDIA",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of validating one text string against the plate formats.
///
/// `canonical_plate`, `vehicle_type` and `confidence_level` are present if and
/// only if the text matched; the constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlateValidation {
    valid: bool,
    raw_text: String,
    #[serde(rename = "plate", skip_serializing_if = "Option::is_none")]
    canonical_plate: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    vehicle_type: Option<VehicleType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence_level: Option<ConfidenceLevel>,
}

impl PlateValidation {
    pub fn invalid(raw_text: impl Into<String>) -> Self {
        Self {
            valid: false,
            raw_text: raw_text.into(),
            canonical_plate: None,
            vehicle_type: None,
            confidence_level: None,
        }
    }

    pub fn matched(
        raw_text: impl Into<String>,
        canonical_plate: impl Into<String>,
        vehicle_type: VehicleType,
        confidence_level: ConfidenceLevel,
    ) -> Self {
        Self {
            valid: true,
            raw_text: raw_text.into(),
            canonical_plate: Some(canonical_plate.into()),
            vehicle_type: Some(vehicle_type),
            confidence_level: Some(confidence_level),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn canonical_plate(&self) -> Option<&str> {
        self.canonical_plate.as_deref()
    }

    pub fn vehicle_type(&self) -> Option<VehicleType> {
        self.vehicle_type
    }

    pub fn confidence_level(&self) -> Option<ConfidenceLevel> {
        self.confidence_level
    }
}

/// Pipeline output for one image
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectionResult {
    pub success: bool,

    /// Cleaned plate text on success, best raw engine text otherwise
    #[serde(default)]
    pub text: String,

    /// Canonical display form (`ABC-123-D`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plate: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<VehicleType>,

    /// Engine confidence of the reported text, 0 when nothing was read
    #[serde(default)]
    pub confidence: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_level: Option<ConfidenceLevel>,

    /// Seconds, rounded to two decimals
    #[serde(default)]
    pub processing_time: f64,

    /// Number of detections that validated as plates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_candidates: Option<usize>,

    /// Operator feedback when no plate validated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Description of a pipeline fault (decode or engine)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One plate flagged for manual follow-up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEntry {
    #[serde(rename = "placa")]
    pub plate: String,

    #[serde(rename = "imagen", default)]
    pub image_reference: String,

    #[serde(rename = "timestamp")]
    pub created_at: NaiveDateTime,

    #[serde(rename = "procesado", default)]
    pub resolved: bool,
}

/// The persisted pending document, also returned by the list endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingDocument {
    #[serde(default)]
    pub data: Vec<PendingEntry>,
}

/// Body of a pending submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddPendingRequest {
    #[serde(rename = "placa")]
    pub plate: Option<String>,

    #[serde(rename = "imagen", default)]
    pub image_reference: Option<String>,
}

/// Plain `{ "msg": ... }` acknowledgement used by the pending and stats routes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub msg: String,
}

impl MessageResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// Running statistics as exposed to clients
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_processed: u64,
    pub successful_detections: u64,
    pub auto_plates: u64,
    pub camioneta_plates: u64,
    /// Percentage with one decimal, 0 when nothing was processed
    pub success_rate: f64,
}

/// A single text line in the raw OCR response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawTextItem {
    pub text: String,
    pub confidence: f32,
}

/// Response of the raw OCR route: every line the engine read plus the best one
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawOcrResponse {
    pub ok: bool,
    pub best: RawTextItem,
    pub items: Vec<RawTextItem>,
}

/// Recognition engine metadata reported by readiness checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub healthy: bool,
    /// JSON Schema of the engine's `init` configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_schema: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plate_validation_invariant() {
        let invalid = PlateValidation::invalid("XX");
        assert!(!invalid.is_valid());
        assert!(invalid.canonical_plate().is_none());
        assert!(invalid.vehicle_type().is_none());

        let valid = PlateValidation::matched(
            "ABC123D",
            "ABC-123-D",
            VehicleType::Auto,
            ConfidenceLevel::Alta,
        );
        assert!(valid.is_valid());
        assert_eq!(valid.canonical_plate(), Some("ABC-123-D"));
        assert_eq!(valid.vehicle_type(), Some(VehicleType::Auto));
    }

    #[test]
    fn test_plate_validation_wire_shape() {
        let valid = PlateValidation::matched(
            "AB1234",
            "AB-1234",
            VehicleType::Camioneta,
            ConfidenceLevel::Media,
        );
        let json = serde_json::to_value(&valid).unwrap();
        assert_eq!(json["valid"], true);
        assert_eq!(json["plate"], "AB-1234");
        assert_eq!(json["type"], "CAMIONETA");
        assert_eq!(json["confidence_level"], "MEDIA");

        let json = serde_json::to_value(PlateValidation::invalid("GTO")).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["raw_text"], "GTO");
        assert!(json.get("plate").is_none());
        assert!(json.get("type").is_none());
    }

    #[test]
    fn test_pending_entry_reads_legacy_document() {
        let doc = r#"{
            "data": [
                {"placa": "ABC-123-D", "imagen": "", "timestamp": "2024-05-01T10:22:03.123456", "procesado": false},
                {"placa": "XY-1234", "timestamp": "2024-05-01T10:30:00"}
            ]
        }"#;

        let parsed: PendingDocument = serde_json::from_str(doc).unwrap();
        assert_eq!(parsed.data.len(), 2);
        assert_eq!(parsed.data[0].plate, "ABC-123-D");
        assert!(!parsed.data[1].resolved);
        assert_eq!(parsed.data[1].image_reference, "");
    }

    #[test]
    fn test_detection_result_omits_absent_fields() {
        let result = DetectionResult {
            success: false,
            message: Some("No se detectó texto en la imagen".to_string()),
            ..Default::default()
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("plate").is_none());
        assert!(json.get("error").is_none());
        assert_eq!(json["message"], "No se detectó texto en la imagen");
    }

    #[test]
    fn test_vehicle_type_wire_names() {
        assert_eq!(
            serde_json::to_value(VehicleType::Camioneta).unwrap(),
            "CAMIONETA"
        );
        assert_eq!(serde_json::to_value(ConfidenceLevel::Media).unwrap(), "MEDIA");
    }
}
