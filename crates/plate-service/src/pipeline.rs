use crate::engine::SharedEngine;
use crate::plate::{self, RankOutcome};
use crate::stats::RunningStats;
use anyhow::{Context, Result};
use common::plates::{DetectionResult, RawOcrResponse, RawTextItem};
use common::validation::round_to;
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub const MESSAGE_NOT_A_PLATE: &str = "Texto detectado pero no es placa válida de Guanajuato";
pub const MESSAGE_NO_TEXT: &str = "No se detectó texto en la imagen";

/// Why a result carries an `error`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The uploaded bytes are not a readable image
    Decode,
    /// The recognition engine faulted
    Engine,
}

/// A pipeline result plus the fault class, if any, for the transport to map
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub result: DetectionResult,
    pub failure: Option<FailureKind>,
}

/// Normalize → recognize → rank, with running statistics.
#[derive(Clone)]
pub struct DetectionPipeline {
    engine: SharedEngine,
    stats: Arc<RunningStats>,
}

impl DetectionPipeline {
    pub fn new(engine: SharedEngine, stats: Arc<RunningStats>) -> Self {
        Self { engine, stats }
    }

    pub fn stats(&self) -> &Arc<RunningStats> {
        &self.stats
    }

    /// Run a decoded image through the pipeline. Never fails: engine faults
    /// come back as a failed result with `error` set.
    pub async fn process(&self, image: &DynamicImage) -> DetectionResult {
        self.run(image, Instant::now()).await.result
    }

    /// Decode uploaded bytes, then process them. A decode fault still counts
    /// as a processed image.
    pub async fn process_upload(&self, bytes: &[u8]) -> PipelineOutput {
        let start = Instant::now();

        match image::load_from_memory(bytes) {
            Ok(image) => self.run(&image, start).await,
            Err(e) => {
                warn!(bytes = bytes.len(), "Failed to decode upload: {}", e);
                self.stats.record(None).await;
                telemetry::metrics::PLATE_IMAGES_PROCESSED
                    .with_label_values(&["decode_error"])
                    .inc();
                PipelineOutput {
                    result: failed(start, format!("Error procesando imagen: {}", e)),
                    failure: Some(FailureKind::Decode),
                }
            }
        }
    }

    /// Read every text line from the un-normalized image. Statistics are
    /// left untouched.
    pub async fn recognize_raw(&self, bytes: &[u8]) -> Result<RawOcrResponse> {
        let image = image::load_from_memory(bytes).context("Failed to decode image")?;
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());

        let detections = {
            let engine = self.engine.lock().await;
            engine
                .recognize(&rgb)
                .await
                .context("Recognition engine failed")?
        };

        let items: Vec<RawTextItem> = detections
            .into_iter()
            .map(|d| RawTextItem {
                text: d.text,
                confidence: d.confidence,
            })
            .collect();

        // Strictly greater, so the first of equal maxima wins and zero
        // confidence lines never replace the empty default
        let mut best = RawTextItem::default();
        for item in &items {
            if item.confidence > best.confidence {
                best = item.clone();
            }
        }

        debug!(lines = items.len(), best = %best.text, "Raw recognition complete");
        Ok(RawOcrResponse {
            ok: true,
            best,
            items,
        })
    }

    async fn run(&self, image: &DynamicImage, start: Instant) -> PipelineOutput {
        let normalized = DynamicImage::ImageLuma8(plate::normalize(image));

        let (engine_id, recognized) = {
            let engine = self.engine.lock().await;
            (engine.id(), engine.recognize(&normalized).await)
        };

        let detections = match recognized {
            Ok(detections) => detections,
            Err(e) => {
                warn!(engine = engine_id, "Recognition engine failed: {:#}", e);
                self.stats.record(None).await;
                telemetry::metrics::PLATE_IMAGES_PROCESSED
                    .with_label_values(&["engine_error"])
                    .inc();
                return PipelineOutput {
                    result: failed(start, e.to_string()),
                    failure: Some(FailureKind::Engine),
                };
            }
        };

        let outcome = plate::rank(&detections);
        let result = match outcome {
            RankOutcome::Plate { best, candidates } => {
                let vehicle_type = best.validation.vehicle_type();
                let confidence_level = best.validation.confidence_level();
                if let Some(vehicle_type) = vehicle_type {
                    telemetry::metrics::PLATE_DETECTIONS
                        .with_label_values(&[
                            vehicle_type.as_str(),
                            confidence_level.map(|l| l.as_str()).unwrap_or(""),
                        ])
                        .inc();
                }

                info!(
                    plate = best.validation.canonical_plate().unwrap_or_default(),
                    vehicle_type = ?vehicle_type,
                    confidence = best.confidence,
                    candidates,
                    "Plate detected"
                );

                DetectionResult {
                    success: true,
                    text: best.validation.raw_text().to_string(),
                    plate: best.validation.canonical_plate().map(str::to_string),
                    vehicle_type,
                    confidence: best.confidence,
                    confidence_level,
                    processing_time: elapsed(start),
                    all_candidates: Some(candidates),
                    ..Default::default()
                }
            }
            RankOutcome::Unmatched(detection) => {
                debug!(text = %detection.text, "No detection validated as a plate");
                DetectionResult {
                    text: detection.text,
                    confidence: detection.confidence,
                    processing_time: elapsed(start),
                    message: Some(MESSAGE_NOT_A_PLATE.to_string()),
                    ..Default::default()
                }
            }
            RankOutcome::Empty => DetectionResult {
                processing_time: elapsed(start),
                message: Some(MESSAGE_NO_TEXT.to_string()),
                ..Default::default()
            },
        };

        // Counted once the outcome is known, in a single stats update
        self.stats.record(result.vehicle_type).await;

        let status = if result.success { "plate" } else { "no_plate" };
        telemetry::metrics::PLATE_IMAGES_PROCESSED
            .with_label_values(&[status])
            .inc();
        telemetry::metrics::PLATE_PROCESSING_LATENCY
            .with_label_values(&[engine_id])
            .observe(start.elapsed().as_secs_f64());

        PipelineOutput {
            result,
            failure: None,
        }
    }
}

fn elapsed(start: Instant) -> f64 {
    round_to(start.elapsed().as_secs_f64(), 2)
}

fn failed(start: Instant, error: String) -> DetectionResult {
    DetectionResult {
        processing_time: elapsed(start),
        error: Some(error),
        ..Default::default()
    }
}
