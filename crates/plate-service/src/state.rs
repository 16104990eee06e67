use crate::engine::SharedEngine;
use crate::pending::PendingQueue;
use crate::pipeline::DetectionPipeline;
use crate::stats::RunningStats;
use anyhow::Result;
use common::plates::EngineInfo;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct PlateServiceState {
    inner: Arc<PlateServiceStateInner>,
}

struct PlateServiceStateInner {
    engine: Option<SharedEngine>,
    pipeline: Option<DetectionPipeline>,
    stats: Arc<RunningStats>,
    pending: PendingQueue,
}

impl PlateServiceState {
    /// `engine` is `None` when it failed to start; detection routes then
    /// report the engine as unavailable while the rest keeps working.
    pub fn new(engine: Option<SharedEngine>, pending: PendingQueue) -> Self {
        let stats = Arc::new(RunningStats::new());
        let pipeline = engine
            .clone()
            .map(|engine| DetectionPipeline::new(engine, stats.clone()));

        Self {
            inner: Arc::new(PlateServiceStateInner {
                engine,
                pipeline,
                stats,
                pending,
            }),
        }
    }

    pub fn pipeline(&self) -> Option<&DetectionPipeline> {
        self.inner.pipeline.as_ref()
    }

    pub fn stats(&self) -> &RunningStats {
        &self.inner.stats
    }

    pub fn pending(&self) -> &PendingQueue {
        &self.inner.pending
    }

    /// Engine metadata and health, `None` without an engine
    pub async fn engine_info(&self) -> Option<EngineInfo> {
        let engine = self.inner.engine.as_ref()?;
        let engine = engine.lock().await;
        let healthy = match engine.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                warn!(engine = engine.id(), "Engine health check failed: {}", e);
                false
            }
        };
        Some(engine.info(healthy))
    }

    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down plate service...");
        if let Some(engine) = &self.inner.engine {
            engine.lock().await.shutdown().await?;
        }
        info!("Plate service shutdown complete");
        Ok(())
    }
}
