//! Picks the single best plate out of everything the engine read in one image.
//!
//! Ordering rule: AUTO plates always win over CAMIONETA plates, whatever the
//! confidences; confidence only breaks ties within a vehicle type.

use super::validator;
use common::plates::{BoundingBox, PlateValidation, RawDetection, VehicleType};
use std::cmp::Ordering;

/// Detections at or below this confidence never become candidates
pub const MIN_CANDIDATE_CONFIDENCE: f32 = 0.3;

/// A detection whose text validated as a plate
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub validation: PlateValidation,
    pub confidence: f32,
    pub region: BoundingBox,
}

impl Candidate {
    fn is_auto(&self) -> bool {
        self.validation.vehicle_type() == Some(VehicleType::Auto)
    }
}

/// Result of ranking one image's detections
#[derive(Debug, Clone, PartialEq)]
pub enum RankOutcome {
    /// At least one candidate validated; `candidates` counts all of them
    Plate { best: Candidate, candidates: usize },
    /// Nothing validated; the highest-confidence raw line, threshold ignored
    Unmatched(RawDetection),
    /// The engine returned no text at all
    Empty,
}

impl RankOutcome {
    pub fn found(&self) -> bool {
        matches!(self, RankOutcome::Plate { .. })
    }
}

/// NaN sorts below every real confidence
fn confidence_key(confidence: f32) -> f32 {
    if confidence.is_nan() {
        f32::NEG_INFINITY
    } else {
        confidence
    }
}

fn by_confidence_desc(a: f32, b: f32) -> Ordering {
    confidence_key(b).total_cmp(&confidence_key(a))
}

pub fn rank(detections: &[RawDetection]) -> RankOutcome {
    let mut candidates: Vec<Candidate> = detections
        .iter()
        .filter(|d| d.confidence > MIN_CANDIDATE_CONFIDENCE)
        .filter_map(|d| {
            let validation = validator::validate(&d.text);
            validation.is_valid().then(|| Candidate {
                validation,
                confidence: d.confidence,
                region: d.region,
            })
        })
        .collect();

    // Stable: equal keys keep engine order
    candidates.sort_by(|a, b| {
        (!a.is_auto())
            .cmp(&!b.is_auto())
            .then_with(|| by_confidence_desc(a.confidence, b.confidence))
    });

    let count = candidates.len();
    if let Some(best) = candidates.into_iter().next() {
        return RankOutcome::Plate {
            best,
            candidates: count,
        };
    }

    detections
        .iter()
        .min_by(|a, b| by_confidence_desc(a.confidence, b.confidence))
        .cloned()
        .map(RankOutcome::Unmatched)
        .unwrap_or(RankOutcome::Empty)
}
