use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;

/// Which recognition engine backs the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Onnx,
    Scripted,
}

impl EngineKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "onnx" => Ok(Self::Onnx),
            "scripted" => Ok(Self::Scripted),
            other => bail!("Unknown ENGINE '{}' (expected onnx or scripted)", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlateServiceConfig {
    /// Address to bind the HTTP server to
    pub bind_addr: String,

    /// JSON document holding the pending review queue
    pub pending_file: PathBuf,

    pub engine: EngineKind,

    /// Text region model; `None` reads whole images as one line
    pub detection_model: Option<String>,

    pub recognition_model: String,

    /// Execution provider preference (CPU, CUDA, TensorRT)
    pub execution_provider: String,
}

impl PlateServiceConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr =
            env::var("PLATE_SERVICE_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string());

        let pending_file = env::var("PENDING_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("pendientes.json"));

        let engine = EngineKind::parse(&env::var("ENGINE").unwrap_or_default())?;

        // An explicitly empty value disables the region stage
        let detection_model = match env::var("ENGINE_DETECTION_MODEL") {
            Ok(path) if path.trim().is_empty() => None,
            Ok(path) => Some(path),
            Err(_) => Some("models/text_detector.onnx".to_string()),
        };

        let recognition_model = env::var("ENGINE_RECOGNITION_MODEL")
            .unwrap_or_else(|_| "models/text_recognizer.onnx".to_string());

        let execution_provider =
            env::var("ENGINE_EXECUTION_PROVIDER").unwrap_or_else(|_| "CPU".to_string());

        Ok(Self {
            bind_addr,
            pending_file,
            engine,
            detection_model,
            recognition_model,
            execution_provider,
        })
    }

    /// Engine `init` payload built from the model settings
    pub fn onnx_engine_config(&self) -> serde_json::Value {
        serde_json::json!({
            "detection_model_path": self.detection_model,
            "recognition_model_path": self.recognition_model,
            "execution_provider": self.execution_provider,
        })
    }
}
