pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod pending;
pub mod pipeline;
pub mod plate;
pub mod state;
pub mod stats;

pub use config::PlateServiceConfig;
pub use engine::{RecognitionEngine, SharedEngine};
pub use pending::{PendingError, PendingQueue};
pub use pipeline::{DetectionPipeline, FailureKind, PipelineOutput};
pub use state::PlateServiceState;
pub use stats::RunningStats;
