use anyhow::Result;
use plate_service::{
    api,
    config::{EngineKind, PlateServiceConfig},
    engine::{self, onnx::OnnxTextEngine, scripted::ScriptedEngine, RecognitionEngine},
    PendingQueue, PlateServiceState, SharedEngine,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = telemetry::init_with_service("plate-service");

    info!("Starting plate service...");

    let config = PlateServiceConfig::from_env()?;
    info!(
        "Plate service configuration: bind={}, pending_file={}, engine={:?}",
        config.bind_addr,
        config.pending_file.display(),
        config.engine
    );

    let engine = start_engine(&config).await;
    let state = PlateServiceState::new(engine, PendingQueue::new(config.pending_file.clone()));

    let app = api::router(state.clone());

    info!("Binding to {}", config.bind_addr);
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Plate service listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

/// Start the configured engine; on failure the service runs without one
async fn start_engine(config: &PlateServiceConfig) -> Option<SharedEngine> {
    let result = match config.engine {
        EngineKind::Onnx => {
            let mut engine = OnnxTextEngine::new();
            engine
                .init(config.onnx_engine_config())
                .await
                .map(|_| engine::shared(engine))
        }
        EngineKind::Scripted => {
            let mut engine = ScriptedEngine::new();
            engine
                .init(serde_json::Value::Null)
                .await
                .map(|_| engine::shared(engine))
        }
    };

    match result {
        Ok(engine) => {
            info!("Recognition engine ready");
            Some(engine)
        }
        Err(e) => {
            warn!(
                "Recognition engine failed to start, detection routes disabled: {:#}",
                e
            );
            None
        }
    }
}

async fn shutdown_signal(state: PlateServiceState) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
    if let Err(e) = state.shutdown().await {
        error!("Error during shutdown: {}", e);
    }
}
