/// ONNX Runtime text recognition engine
///
/// Two stages:
/// 1. Region stage (optional): locates text regions with a YOLO-style detector
/// 2. Recognition stage: reads each region with a CTC text recognizer
///
/// Without a region model the whole image is read as a single line.
use super::RecognitionEngine;
use anyhow::{Context, Result};
use async_trait::async_trait;
use common::plates::{BoundingBox, RawDetection};
use image::DynamicImage;
use ndarray::{Array, IxDyn};
use ort::{
    execution_providers::{CPUExecutionProvider, CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::GraphOptimizationLevel, Session},
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnnxEngineConfig {
    /// Path to the text-region detection model; `None` reads the whole image
    #[serde(default)]
    pub detection_model_path: Option<String>,

    /// Path to the CTC text recognition model
    pub recognition_model_path: String,

    /// Minimum region score (0.0 to 1.0)
    #[serde(default = "default_region_threshold")]
    pub region_threshold: f32,

    /// IoU threshold for NMS
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,

    /// Maximum number of text regions read per image
    #[serde(default = "default_max_regions")]
    pub max_regions: usize,

    /// Detection model input size (width and height)
    #[serde(default = "default_detection_input_size")]
    pub detection_input_size: u32,

    #[serde(default = "default_recognition_input_width")]
    pub recognition_input_width: u32,

    #[serde(default = "default_recognition_input_height")]
    pub recognition_input_height: u32,

    /// Recognizer vocabulary; CTC blank is index 0, so vocab starts at index 1
    #[serde(default = "default_char_vocab")]
    pub char_vocab: String,

    /// Recognizer emits raw logits rather than probabilities
    #[serde(default)]
    pub outputs_logits: bool,

    /// Execution provider preference (CPU, CUDA, TensorRT)
    #[serde(default = "default_execution_provider")]
    pub execution_provider: String,

    /// GPU device ID
    #[serde(default)]
    pub device_id: i32,

    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,

    #[serde(default = "default_inter_threads")]
    pub inter_threads: usize,
}

fn default_region_threshold() -> f32 {
    0.25
}

fn default_iou_threshold() -> f32 {
    0.4
}

fn default_max_regions() -> usize {
    10
}

fn default_detection_input_size() -> u32 {
    640
}

fn default_recognition_input_width() -> u32 {
    200
}

fn default_recognition_input_height() -> u32 {
    64
}

fn default_char_vocab() -> String {
    "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-".to_string()
}

fn default_execution_provider() -> String {
    "CPU".to_string()
}

fn default_intra_threads() -> usize {
    4
}

fn default_inter_threads() -> usize {
    1
}

impl Default for OnnxEngineConfig {
    fn default() -> Self {
        Self {
            detection_model_path: Some("models/text_detector.onnx".to_string()),
            recognition_model_path: "models/text_recognizer.onnx".to_string(),
            region_threshold: default_region_threshold(),
            iou_threshold: default_iou_threshold(),
            max_regions: default_max_regions(),
            detection_input_size: default_detection_input_size(),
            recognition_input_width: default_recognition_input_width(),
            recognition_input_height: default_recognition_input_height(),
            char_vocab: default_char_vocab(),
            outputs_logits: false,
            execution_provider: default_execution_provider(),
            device_id: 0,
            intra_threads: default_intra_threads(),
            inter_threads: default_inter_threads(),
        }
    }
}

/// Text recognition engine backed by ONNX Runtime sessions
pub struct OnnxTextEngine {
    config: OnnxEngineConfig,
    detection_session: Option<Arc<Mutex<Session>>>,
    recognition_session: Option<Arc<Mutex<Session>>>,
    execution_provider_used: String,
}

impl OnnxTextEngine {
    pub fn new() -> Self {
        Self::with_config(OnnxEngineConfig::default())
    }

    pub fn with_config(config: OnnxEngineConfig) -> Self {
        Self {
            config,
            detection_session: None,
            recognition_session: None,
            execution_provider_used: "CPU".to_string(),
        }
    }

    /// Resize to the square detector input, NCHW, normalized to [0, 1]
    fn preprocess_for_detection(&self, img: &DynamicImage) -> Array<f32, IxDyn> {
        let size = self.config.detection_input_size;
        let resized = img.resize_exact(size, size, image::imageops::FilterType::Triangle);
        let rgb_img = resized.to_rgb8();

        let mut input = Array::zeros(IxDyn(&[1, 3, size as usize, size as usize]));
        for (x, y, pixel) in rgb_img.enumerate_pixels() {
            for c in 0..3 {
                input[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
            }
        }
        input
    }

    /// Resize a text region to the recognizer input, single channel NCHW
    fn preprocess_for_recognition(&self, img: &DynamicImage) -> Array<f32, IxDyn> {
        let width = self.config.recognition_input_width;
        let height = self.config.recognition_input_height;
        let resized = img.resize_exact(width, height, image::imageops::FilterType::Triangle);
        let gray_img = resized.to_luma8();

        let mut input = Array::zeros(IxDyn(&[1, 1, height as usize, width as usize]));
        for (x, y, pixel) in gray_img.enumerate_pixels() {
            input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
        }
        input
    }

    /// Non-Maximum Suppression, highest score first
    fn nms(&self, mut boxes: Vec<(BoundingBox, f32)>) -> Vec<(BoundingBox, f32)> {
        boxes.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut keep: Vec<(BoundingBox, f32)> = Vec::new();
        for candidate in boxes {
            if keep
                .iter()
                .all(|kept| calculate_iou(&kept.0, &candidate.0) < self.config.iou_threshold)
            {
                keep.push(candidate);
            }
        }
        keep
    }

    /// Decode YOLO-style output `[batch, 5, predictions]` (cx, cy, w, h, score)
    fn postprocess_detection(
        &self,
        output: &Array<f32, IxDyn>,
        image_width: u32,
        image_height: u32,
    ) -> Result<Vec<(BoundingBox, f32)>> {
        let shape = output.shape();
        if shape.len() != 3 || shape[1] < 5 {
            anyhow::bail!("Unexpected detection output shape {:?}", shape);
        }
        if image_width == 0 || image_height == 0 {
            return Ok(Vec::new());
        }

        let scale_x = image_width as f32 / self.config.detection_input_size as f32;
        let scale_y = image_height as f32 / self.config.detection_input_size as f32;

        let mut boxes = Vec::new();
        for i in 0..shape[2] {
            let score = output[[0, 4, i]];
            if score < self.config.region_threshold {
                continue;
            }

            let cx = output[[0, 0, i]];
            let cy = output[[0, 1, i]];
            let w = output[[0, 2, i]];
            let h = output[[0, 3, i]];

            let x = ((cx - w / 2.0) * scale_x).max(0.0) as u32;
            let y = ((cy - h / 2.0) * scale_y).max(0.0) as u32;
            let x = x.min(image_width.saturating_sub(1));
            let y = y.min(image_height.saturating_sub(1));
            let width = ((w * scale_x) as u32).clamp(1, image_width - x);
            let height = ((h * scale_y) as u32).clamp(1, image_height - y);

            boxes.push((
                BoundingBox {
                    x,
                    y,
                    width,
                    height,
                },
                score,
            ));
        }

        Ok(self
            .nms(boxes)
            .into_iter()
            .take(self.config.max_regions)
            .collect())
    }

    /// CTC greedy decoding over `[batch, steps, vocab + 1]`.
    ///
    /// Returns the text and the mean probability of the emitted characters.
    fn ctc_decode(&self, output: &Array<f32, IxDyn>) -> Result<(String, f32)> {
        let shape = output.shape();
        if shape.len() != 3 {
            anyhow::bail!("Unexpected recognition output shape {:?}", shape);
        }
        let (steps, vocab_size) = (shape[1], shape[2]);
        let vocab: Vec<char> = self.config.char_vocab.chars().collect();

        let mut text = String::new();
        let mut probs = Vec::new();
        let mut prev_idx = 0;

        for t in 0..steps {
            let row: Vec<f32> = (0..vocab_size).map(|c| output[[0, t, c]]).collect();
            let Some((max_idx, max_val)) = row
                .iter()
                .copied()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(&b.1))
            else {
                continue;
            };

            // Skip blank (index 0) and repeats
            if max_idx > 0 && max_idx != prev_idx {
                if let Some(&ch) = vocab.get(max_idx - 1) {
                    text.push(ch);
                    probs.push(if self.config.outputs_logits {
                        softmax_peak(&row, max_val)
                    } else {
                        max_val
                    });
                }
            }
            prev_idx = max_idx;
        }

        let confidence = if probs.is_empty() {
            0.0
        } else {
            (probs.iter().sum::<f32>() / probs.len() as f32).clamp(0.0, 1.0)
        };

        Ok((text, confidence))
    }

    fn run_detection(&self, img: &DynamicImage) -> Result<Vec<(BoundingBox, f32)>> {
        let Some(session_lock) = self.detection_session.as_ref() else {
            return Ok(vec![(
                BoundingBox {
                    x: 0,
                    y: 0,
                    width: img.width(),
                    height: img.height(),
                },
                1.0,
            )]);
        };

        let input_tensor = Value::from_array(self.preprocess_for_detection(img))?;
        let mut session = session_lock
            .lock()
            .map_err(|e| anyhow::anyhow!("Failed to lock detection session: {}", e))?;
        let outputs = session.run(ort::inputs![input_tensor])?;

        let output_value = outputs
            .get("output0")
            .or_else(|| outputs.get("output"))
            .or_else(|| outputs.get("boxes"))
            .context("No detection output tensor found (tried: output0, output, boxes)")?;
        let (shape, data) = output_value.try_extract_tensor::<f32>()?;
        let shape_usize: Vec<usize> = shape.as_ref().iter().map(|&x| x as usize).collect();
        let output = Array::from_shape_vec(IxDyn(&shape_usize), data.to_vec())?;

        self.postprocess_detection(&output, img.width(), img.height())
    }

    fn read_region(&self, region_img: &DynamicImage) -> Result<(String, f32)> {
        let session_lock = self
            .recognition_session
            .as_ref()
            .context("Recognition model not initialized - call init() first")?;

        let input_tensor = Value::from_array(self.preprocess_for_recognition(region_img))?;
        let mut session = session_lock
            .lock()
            .map_err(|e| anyhow::anyhow!("Failed to lock recognition session: {}", e))?;
        let outputs = session.run(ort::inputs![input_tensor])?;

        let output_value = outputs
            .get("output")
            .or_else(|| outputs.get("output0"))
            .or_else(|| outputs.get("logits"))
            .context("No recognition output tensor found (tried: output, output0, logits)")?;
        let (shape, data) = output_value.try_extract_tensor::<f32>()?;
        let shape_usize: Vec<usize> = shape.as_ref().iter().map(|&x| x as usize).collect();
        let output = Array::from_shape_vec(IxDyn(&shape_usize), data.to_vec())?;

        self.ctc_decode(&output)
    }

    fn read_image(&self, img: &DynamicImage) -> Result<Vec<RawDetection>> {
        if self.recognition_session.is_none() {
            anyhow::bail!("Recognition model not initialized - call init() first");
        }

        let mut detections = Vec::new();
        for (region, _score) in self.run_detection(img)? {
            let crop = img.crop_imm(region.x, region.y, region.width, region.height);
            match self.read_region(&crop) {
                Ok((text, confidence)) if !text.is_empty() => {
                    detections.push(RawDetection::new(region, text, confidence));
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(?region, "Text recognition failed: {}", e),
            }
        }
        Ok(detections)
    }

    /// Create an ONNX session, falling back TensorRT → CUDA → CPU
    fn create_session(&self, model_path: &str) -> Result<(Session, String)> {
        match self.config.execution_provider.to_uppercase().as_str() {
            "TENSORRT" => {
                tracing::info!("Attempting TensorRT for {}", model_path);
                let result = Session::builder()
                    .context("Failed to create session builder")?
                    .with_optimization_level(GraphOptimizationLevel::Level3)
                    .context("Failed to set optimization level")?
                    .with_intra_threads(self.config.intra_threads)
                    .context("Failed to set intra threads")?
                    .with_inter_threads(self.config.inter_threads)
                    .context("Failed to set inter threads")?
                    .with_execution_providers([
                        TensorRTExecutionProvider::default()
                            .with_device_id(self.config.device_id)
                            .build(),
                        CUDAExecutionProvider::default()
                            .with_device_id(self.config.device_id)
                            .build(),
                        CPUExecutionProvider::default().build(),
                    ])
                    .context("Failed to set execution providers")?
                    .commit_from_file(model_path);

                match result {
                    Ok(session) => Ok((session, "TensorRT".to_string())),
                    Err(e) => {
                        tracing::warn!("TensorRT failed, trying CUDA: {}", e);
                        self.try_cuda(model_path)
                    }
                }
            }
            "CUDA" => self.try_cuda(model_path),
            _ => self.try_cpu(model_path),
        }
    }

    fn try_cuda(&self, model_path: &str) -> Result<(Session, String)> {
        tracing::info!("Attempting CUDA for {}", model_path);
        let result = Session::builder()
            .context("Failed to create session builder")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(self.config.intra_threads)
            .context("Failed to set intra threads")?
            .with_inter_threads(self.config.inter_threads)
            .context("Failed to set inter threads")?
            .with_execution_providers([
                CUDAExecutionProvider::default()
                    .with_device_id(self.config.device_id)
                    .build(),
                CPUExecutionProvider::default().build(),
            ])
            .context("Failed to set execution providers")?
            .commit_from_file(model_path);

        match result {
            Ok(session) => Ok((session, "CUDA".to_string())),
            Err(e) => {
                tracing::warn!("CUDA failed, using CPU: {}", e);
                self.try_cpu(model_path)
            }
        }
    }

    fn try_cpu(&self, model_path: &str) -> Result<(Session, String)> {
        tracing::info!("Using CPU for {}", model_path);
        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(self.config.intra_threads)
            .context("Failed to set intra threads")?
            .with_inter_threads(self.config.inter_threads)
            .context("Failed to set inter threads")?
            .commit_from_file(model_path)
            .context("Failed to load model from file")?;
        Ok((session, "CPU".to_string()))
    }
}

impl Default for OnnxTextEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Intersection over Union of two boxes
fn calculate_iou(box1: &BoundingBox, box2: &BoundingBox) -> f32 {
    let x1 = box1.x.max(box2.x);
    let y1 = box1.y.max(box2.y);
    let x2 = (box1.x + box1.width).min(box2.x + box2.width);
    let y2 = (box1.y + box1.height).min(box2.y + box2.height);

    let intersection = if x2 > x1 && y2 > y1 {
        ((x2 - x1) * (y2 - y1)) as f32
    } else {
        0.0
    };

    let area1 = (box1.width * box1.height) as f32;
    let area2 = (box2.width * box2.height) as f32;
    let union = area1 + area2 - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Probability of the winning logit under softmax
fn softmax_peak(row: &[f32], max_val: f32) -> f32 {
    let denom: f32 = row.iter().map(|v| (v - max_val).exp()).sum();
    if denom > 0.0 {
        1.0 / denom
    } else {
        0.0
    }
}

#[async_trait]
impl RecognitionEngine for OnnxTextEngine {
    fn id(&self) -> &'static str {
        "onnx_text"
    }

    fn name(&self) -> &'static str {
        "ONNX Text Recognizer"
    }

    fn description(&self) -> &'static str {
        "Text region detection and CTC line recognition using ONNX models"
    }

    fn config_schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "detection_model_path": {
                    "type": ["string", "null"],
                    "description": "Text region detector; null reads the whole image as one line"
                },
                "recognition_model_path": {
                    "type": "string",
                    "default": "models/text_recognizer.onnx",
                    "description": "CTC text recognition model"
                },
                "region_threshold": {
                    "type": "number",
                    "minimum": 0.0,
                    "maximum": 1.0,
                    "default": 0.25
                },
                "iou_threshold": {
                    "type": "number",
                    "minimum": 0.0,
                    "maximum": 1.0,
                    "default": 0.4
                },
                "max_regions": {
                    "type": "integer",
                    "minimum": 1,
                    "default": 10
                },
                "char_vocab": {
                    "type": "string",
                    "default": "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-"
                },
                "outputs_logits": {
                    "type": "boolean",
                    "default": false
                },
                "execution_provider": {
                    "type": "string",
                    "enum": ["CPU", "CUDA", "TensorRT"],
                    "default": "CPU"
                }
            },
            "required": ["recognition_model_path"]
        }))
    }

    async fn init(&mut self, config: serde_json::Value) -> Result<()> {
        if !config.is_null() {
            self.config = serde_json::from_value(config)?;
        }

        if let Some(path) = self.config.detection_model_path.clone() {
            let (session, provider) = self.create_session(&path)?;
            self.detection_session = Some(Arc::new(Mutex::new(session)));
            tracing::info!(path = %path, provider = %provider, "Loaded text region model");
        } else {
            self.detection_session = None;
            tracing::info!("No region model configured - reading whole images");
        }

        let path = self.config.recognition_model_path.clone();
        let (session, provider) = self.create_session(&path)?;
        self.recognition_session = Some(Arc::new(Mutex::new(session)));
        self.execution_provider_used = provider.clone();
        tracing::info!(path = %path, provider = %provider, "Loaded text recognition model");

        Ok(())
    }

    async fn recognize(&self, image: &DynamicImage) -> Result<Vec<RawDetection>> {
        let start = std::time::Instant::now();
        let detections = self.read_image(image)?;

        telemetry::metrics::ENGINE_INFERENCE_TIME
            .with_label_values(&[self.id(), &self.execution_provider_used])
            .observe(start.elapsed().as_secs_f64());

        Ok(detections)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.recognition_session.is_some())
    }

    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down ONNX text engine");
        self.detection_session = None;
        self.recognition_session = None;
        Ok(())
    }
}
