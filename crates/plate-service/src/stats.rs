use common::plates::{StatsSnapshot, VehicleType};
use common::validation::round_to;
use tokio::sync::Mutex;

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    total_processed: u64,
    successful_detections: u64,
    auto_plates: u64,
    camioneta_plates: u64,
}

/// Process-lifetime detection counters, shared between requests.
///
/// Never persisted: a restart starts from zero.
#[derive(Debug, Default)]
pub struct RunningStats {
    counters: Mutex<Counters>,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one processed image and, when a plate validated, its type.
    ///
    /// Both counters move under one lock so a concurrent `reset` can never
    /// split them.
    pub async fn record(&self, plate: Option<VehicleType>) {
        let mut counters = self.counters.lock().await;
        counters.total_processed += 1;
        match plate {
            Some(VehicleType::Auto) => {
                counters.successful_detections += 1;
                counters.auto_plates += 1;
            }
            Some(VehicleType::Camioneta) => {
                counters.successful_detections += 1;
                counters.camioneta_plates += 1;
            }
            None => {}
        }
    }

    pub async fn snapshot(&self) -> StatsSnapshot {
        let counters = *self.counters.lock().await;
        let success_rate = if counters.total_processed == 0 {
            0.0
        } else {
            round_to(
                counters.successful_detections as f64 / counters.total_processed as f64 * 100.0,
                1,
            )
        };

        StatsSnapshot {
            total_processed: counters.total_processed,
            successful_detections: counters.successful_detections,
            auto_plates: counters.auto_plates,
            camioneta_plates: counters.camioneta_plates,
            success_rate,
        }
    }

    pub async fn reset(&self) {
        *self.counters.lock().await = Counters::default();
        tracing::info!("Detection statistics reset");
    }
}
