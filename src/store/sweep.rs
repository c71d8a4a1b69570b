use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::app::metrics::AppMetrics;

use super::metric_store::MetricStore;

/// Periodically evicts stale records, independent of request traffic.
///
/// A failed tick is logged and retried on the next one.
pub fn spawn_sweep_loop(
    store: MetricStore,
    every: Duration,
    metrics: Option<Arc<AppMetrics>>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first sweep runs one full interval after start
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("stale sweep shutting down");
                    break;
                }
                _ = interval.tick() => {}
            }

            match store.clear_stale().await {
                Ok(evicted) => {
                    if evicted > 0 {
                        tracing::info!(evicted, backend = store.kind().as_str(), "stale cells evicted");
                    }
                    if let Some(m) = metrics.as_ref() {
                        m.inc_evicted(evicted as u64);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, backend = store.kind().as_str(), "stale sweep failed");
                    if let Some(m) = metrics.as_ref() {
                        m.inc_sweep_error();
                    }
                }
            }
        }
    })
}
