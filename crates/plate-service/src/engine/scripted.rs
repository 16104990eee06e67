/// Scripted recognition engine for tests and demonstrations
use super::RecognitionEngine;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use common::plates::RawDetection;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// What the engine answers for one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedResponse {
    Detections(Vec<RawDetection>),
    /// Simulate an engine fault with this message
    Fault(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptedEngineConfig {
    /// Responses handed out round-robin, one per call
    #[serde(default)]
    pub responses: Vec<ScriptedResponse>,

    /// Simulate processing delay in milliseconds
    #[serde(default)]
    pub simulated_delay_ms: u64,
}

/// Engine that replays configured responses instead of reading the image
pub struct ScriptedEngine {
    config: ScriptedEngineConfig,
    calls: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::with_config(ScriptedEngineConfig::default())
    }

    pub fn with_config(config: ScriptedEngineConfig) -> Self {
        Self {
            config,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answer with the same detections
    pub fn with_detections(detections: Vec<RawDetection>) -> Self {
        Self::with_responses(vec![ScriptedResponse::Detections(detections)])
    }

    pub fn with_responses(responses: Vec<ScriptedResponse>) -> Self {
        Self::with_config(ScriptedEngineConfig {
            responses,
            simulated_delay_ms: 0,
        })
    }

    /// Always fail with the given message
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_responses(vec![ScriptedResponse::Fault(message.into())])
    }

    /// Number of recognize calls served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecognitionEngine for ScriptedEngine {
    fn id(&self) -> &'static str {
        "scripted"
    }

    fn name(&self) -> &'static str {
        "Scripted Engine"
    }

    fn description(&self) -> &'static str {
        "Replays configured text detections; for testing and demonstration"
    }

    fn config_schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "responses": {
                    "type": "array",
                    "description": "Per-call responses, cycled: {\"detections\": [...]} or {\"fault\": \"message\"}"
                },
                "simulated_delay_ms": {
                    "type": "integer",
                    "minimum": 0,
                    "default": 0,
                    "description": "Simulated processing delay in milliseconds"
                }
            }
        }))
    }

    async fn init(&mut self, config: serde_json::Value) -> Result<()> {
        if !config.is_null() {
            self.config = serde_json::from_value(config)?;
        }
        tracing::info!(
            responses = self.config.responses.len(),
            "Initialized scripted engine"
        );
        Ok(())
    }

    async fn recognize(&self, _image: &DynamicImage) -> Result<Vec<RawDetection>> {
        if self.config.simulated_delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(
                self.config.simulated_delay_ms,
            ))
            .await;
        }

        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.config.responses.is_empty() {
            return Ok(Vec::new());
        }

        match &self.config.responses[call % self.config.responses.len()] {
            ScriptedResponse::Detections(detections) => Ok(detections.clone()),
            ScriptedResponse::Fault(message) => Err(anyhow!("{}", message)),
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down scripted engine");
        Ok(())
    }
}
