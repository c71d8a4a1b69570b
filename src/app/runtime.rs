use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::app::config::AppConfig;
use crate::app::health::{CapacityInput, Evaluation, HealthEvaluator};
use crate::app::metrics::AppMetrics;
use crate::app::state::CapacityState;
use crate::error::AppResult;
use crate::ingest::firehose::FirehoseClient;
use crate::ingest::sink::CapacitySink;
use crate::redis::config::RedisConfig;
use crate::redis::vcap::VCAP_SERVICES_ENV;
use crate::store::{MetricRecord, MetricStore, spawn_sweep_loop};

/// Everything a request handler or background task needs. Cheap to clone.
#[derive(Clone)]
pub struct AppRuntime {
    pub cfg: Arc<AppConfig>,
    pub store: MetricStore,
    pub state: Arc<CapacityState>,
    pub metrics: Arc<AppMetrics>,
    pub evaluator: HealthEvaluator,

    // Keep the JoinHandle private and shared across clones.
    sweep_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    cancel: CancellationToken,
}

impl AppRuntime {
    /// Production wiring: picks the store backend from `redis_cfg` and
    /// `VCAP_SERVICES`, then starts the sweep.
    pub async fn new(cfg: AppConfig, redis_cfg: &RedisConfig) -> AppResult<Self> {
        let vcap = std::env::var(VCAP_SERVICES_ENV).ok();
        let store = MetricStore::connect(redis_cfg, vcap.as_deref()).await;

        if !store.is_persistent() && redis_cfg.enabled {
            warn!(
                "metric store is in-memory: readings are lost on restart and reports wait out the start-up grace period"
            );
        }

        Self::from_parts(cfg, store, Utc::now())
    }

    /// Wire a runtime around an existing store. Must run inside a tokio runtime.
    pub fn from_parts(
        cfg: AppConfig,
        store: MetricStore,
        started_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        let cfg = Arc::new(cfg);

        let metrics = Arc::new(AppMetrics::new(&cfg.id, &cfg.env, cfg.config_version)?);
        metrics.set_backend_persistent(store.is_persistent());

        let state = Arc::new(CapacityState::new(
            cfg.monitor.watermark.clone(),
            started_at,
        ));

        let cancel = CancellationToken::new();
        let jh = spawn_sweep_loop(
            store.clone(),
            Duration::from_secs(cfg.monitor.sweep_interval_sec),
            Some(metrics.clone()),
            cancel.clone(),
        );

        info!(
            app_id = %cfg.id,
            backend = store.kind().as_str(),
            watermark = %state.watermark(),
            sweep_interval_sec = cfg.monitor.sweep_interval_sec,
            "runtime ready"
        );
        metrics.set_ready(true);

        Ok(Self {
            cfg,
            store,
            state,
            metrics,
            evaluator: HealthEvaluator::default(),
            sweep_task: Arc::new(Mutex::new(Some(jh))),
            cancel,
        })
    }
}

// --------------------------------------------------
// Reports
// --------------------------------------------------
impl AppRuntime {
    /// Snapshot of every known record. A backend failure reads as "no data".
    pub async fn snapshot(&self) -> HashMap<String, MetricRecord> {
        match self.store.get_all().await {
            Ok(all) => all,
            Err(e) => {
                warn!(error = %e, backend = self.store.kind().as_str(), "snapshot read failed; reporting without data");
                HashMap::new()
            }
        }
    }

    #[instrument(name = "runtime.evaluate", skip_all)]
    pub async fn evaluate_now(&self) -> Evaluation {
        let snapshot = self.snapshot().await;
        self.evaluate_snapshot(&snapshot, Utc::now())
    }

    pub fn evaluate_snapshot(
        &self,
        snapshot: &HashMap<String, MetricRecord>,
        now: DateTime<Utc>,
    ) -> Evaluation {
        let input = CapacityInput {
            snapshot,
            cell_memory: self.state.cell_memory(),
            watermark: self.state.watermark(),
            persistent_store: self.store.is_persistent(),
            started_at: self.state.started_at(),
            now,
        };

        let eval = self.evaluator.evaluate(&input);
        self.metrics.observe_report(
            eval.status_code(),
            eval.verdict.label(),
            eval.report.cell_count,
            eval.report.watermark_memory_percent,
        );
        eval
    }
}

// --------------------------------------------------
// Ingestion
// --------------------------------------------------
impl AppRuntime {
    pub fn capacity_sink(&self) -> CapacitySink {
        CapacitySink::new(
            self.store.clone(),
            self.state.clone(),
            Some(self.metrics.clone()),
        )
    }

    pub fn firehose_client(&self) -> AppResult<FirehoseClient> {
        FirehoseClient::new(
            self.cfg.firehose.clone(),
            self.capacity_sink(),
            Some(self.metrics.clone()),
        )
    }
}

// --------------------------------------------------
// Lifecycle
// --------------------------------------------------
impl AppRuntime {
    #[inline]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop background tasks and wait for the sweep to finish its tick.
    pub async fn shutdown(&self) {
        self.metrics.set_ready(false);
        self.cancel.cancel();

        if let Some(jh) = self.sweep_task.lock().await.take() {
            if let Err(e) = jh.await {
                warn!(error = %e, "sweep task ended abnormally");
            }
        }
        info!("runtime stopped");
    }

    pub fn encode_prometheus_text(&self) -> AppResult<String> {
        let mut out = self.metrics.encode_text()?;
        out.push('\n');
        Ok(out)
    }
}
