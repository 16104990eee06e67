pub mod onnx;
pub mod scripted;

use anyhow::Result;
use async_trait::async_trait;
use common::plates::{EngineInfo, RawDetection};
use image::DynamicImage;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Text recognition engine seam.
///
/// The pipeline treats an engine as a black box that turns an image into text
/// lines with confidences. Engines are not assumed reentrant: callers hold
/// them behind a [`SharedEngine`] mutex.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Unique engine identifier (e.g., "onnx_text")
    fn id(&self) -> &'static str;

    /// Human-readable engine name
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Engine-specific configuration schema (JSON Schema)
    fn config_schema(&self) -> Option<serde_json::Value> {
        None
    }

    /// Initialize the engine with configuration; `Null` keeps defaults
    async fn init(&mut self, config: serde_json::Value) -> Result<()>;

    /// Read every text line in the image
    async fn recognize(&self, image: &DynamicImage) -> Result<Vec<RawDetection>>;

    /// Verify the engine is operational
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }

    fn info(&self, healthy: bool) -> EngineInfo {
        EngineInfo {
            id: self.id().to_string(),
            name: self.name().to_string(),
            description: self.description().to_string(),
            healthy,
            config_schema: self.config_schema(),
        }
    }
}

/// An engine shared between request handlers; the mutex serializes calls
pub type SharedEngine = Arc<Mutex<dyn RecognitionEngine>>;

pub fn shared<E: RecognitionEngine + 'static>(engine: E) -> SharedEngine {
    Arc::new(Mutex::new(engine))
}
