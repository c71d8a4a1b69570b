use std::sync::Arc;

use tracing::{debug, info};

use crate::app::metrics::AppMetrics;
use crate::app::state::CapacityState;
use crate::error::AppResult;
use crate::ingest::classify::CapacityReading;
use crate::store::MetricStore;

/// Where classified readings land: the store for per-cell remaining memory,
/// the shared state for the fleet-wide cell size.
#[derive(Clone, Debug)]
pub struct CapacitySink {
    store: MetricStore,
    state: Arc<CapacityState>,
    metrics: Option<Arc<AppMetrics>>,
}

impl CapacitySink {
    pub fn new(
        store: MetricStore,
        state: Arc<CapacityState>,
        metrics: Option<Arc<AppMetrics>>,
    ) -> Self {
        Self {
            store,
            state,
            metrics,
        }
    }

    pub async fn apply(&self, reading: CapacityReading) -> AppResult<()> {
        match reading {
            CapacityReading::TotalMemory { cell_id, value } => {
                if self.state.observe_cell_memory(value) {
                    info!(cell_id = %cell_id, cell_memory = value, "per-cell memory discovered");
                    if let Some(m) = &self.metrics {
                        m.set_cell_memory(value);
                    }
                }
            }
            CapacityReading::RemainingMemory { cell_id, record } => {
                let res = self.store.set(&cell_id, record).await;
                if let Some(m) = &self.metrics {
                    match &res {
                        Ok(()) => m.inc_reading(),
                        Err(_) => m.inc_write_error(),
                    }
                }
                res?;
                debug!(cell_id = %cell_id, memory = record.remaining_memory, "remaining memory stored");
            }
        }
        Ok(())
    }
}
