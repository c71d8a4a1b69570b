use crate::error::AppResult;
#[cfg(not(feature = "metrics"))]
use crate::error::AppError;

#[cfg(feature = "metrics")]
use prometheus::{Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

/// Process-level metrics.
///
/// Scope:
/// - app identity & readiness
/// - ingestion throughput
/// - store eviction
/// - report outcomes
///
/// NO per-cell labels.
#[derive(Clone, Debug)]
pub struct AppMetrics {
    #[cfg(feature = "metrics")]
    registry: Registry,

    // --------------------------------------------------
    // Lifecycle / readiness
    // --------------------------------------------------
    #[cfg(feature = "metrics")]
    pub app_ready: IntGauge,

    // --------------------------------------------------
    // Ingestion
    // --------------------------------------------------
    #[cfg(feature = "metrics")]
    pub firehose_messages_total: IntCounter,
    #[cfg(feature = "metrics")]
    pub firehose_decode_errors_total: IntCounter,
    #[cfg(feature = "metrics")]
    pub capacity_readings_total: IntCounter,
    #[cfg(feature = "metrics")]
    pub capacity_write_errors_total: IntCounter,
    #[cfg(feature = "metrics")]
    pub capacity_cell_memory: Gauge,

    // --------------------------------------------------
    // Store
    // --------------------------------------------------
    #[cfg(feature = "metrics")]
    pub store_backend_persistent: IntGauge,
    #[cfg(feature = "metrics")]
    pub store_evicted_total: IntCounter,
    #[cfg(feature = "metrics")]
    pub store_sweep_errors_total: IntCounter,

    // --------------------------------------------------
    // Reports
    // --------------------------------------------------
    #[cfg(feature = "metrics")]
    pub report_requests_total: IntCounterVec,
    #[cfg(feature = "metrics")]
    pub report_fresh_cells: IntGauge,
    #[cfg(feature = "metrics")]
    pub report_watermark_memory_percent: Gauge,

    // no-op fallback
    #[cfg(not(feature = "metrics"))]
    _noop: (),
}

impl AppMetrics {
    pub fn new(app_id: &str, env: &str, config_version: u32) -> AppResult<Self> {
        #[cfg(feature = "metrics")]
        {
            let registry = Registry::new();

            let app_info = IntGauge::with_opts(
                Opts::new("app_info", "Static app identity info")
                    .const_label("app_id", app_id)
                    .const_label("env", env)
                    .const_label("config_version", config_version.to_string()),
            )?;
            app_info.set(1);
            registry.register(Box::new(app_info))?;

            let app_ready = IntGauge::with_opts(Opts::new(
                "app_ready",
                "Whether the app is ready to serve traffic (0/1)",
            ))?;

            let firehose_messages_total = IntCounter::with_opts(Opts::new(
                "firehose_messages_total",
                "Total frames received from the firehose",
            ))?;
            let firehose_decode_errors_total = IntCounter::with_opts(Opts::new(
                "firehose_decode_errors_total",
                "Total firehose frames that could not be decoded",
            ))?;
            let capacity_readings_total = IntCounter::with_opts(Opts::new(
                "capacity_readings_total",
                "Total remaining-memory readings written to the store",
            ))?;
            let capacity_write_errors_total = IntCounter::with_opts(Opts::new(
                "capacity_write_errors_total",
                "Total remaining-memory readings the store rejected",
            ))?;
            let capacity_cell_memory = Gauge::with_opts(Opts::new(
                "capacity_cell_memory",
                "Per-cell total memory (MiB), 0 until observed",
            ))?;

            let store_backend_persistent = IntGauge::with_opts(Opts::new(
                "store_backend_persistent",
                "Whether the metric store survives restarts (1=redis, 0=memory)",
            ))?;
            let store_evicted_total = IntCounter::with_opts(Opts::new(
                "store_evicted_total",
                "Total stale records removed by the sweep",
            ))?;
            let store_sweep_errors_total = IntCounter::with_opts(Opts::new(
                "store_sweep_errors_total",
                "Total sweep ticks that failed",
            ))?;

            let report_requests_total = IntCounterVec::new(
                Opts::new("report_requests_total", "Total capacity reports served"),
                &["status", "verdict"],
            )?;
            let report_fresh_cells = IntGauge::with_opts(Opts::new(
                "report_fresh_cells",
                "Fresh cells seen by the last report",
            ))?;
            let report_watermark_memory_percent = Gauge::with_opts(Opts::new(
                "report_watermark_memory_percent",
                "WatermarkMemoryPercent of the last report",
            ))?;

            // --------------------------------------------------
            // Register
            // --------------------------------------------------
            for g in [
                &app_ready,
                &store_backend_persistent,
                &report_fresh_cells,
            ] {
                registry.register(Box::new(g.clone()))?;
            }

            for g in [&capacity_cell_memory, &report_watermark_memory_percent] {
                registry.register(Box::new(g.clone()))?;
            }

            for c in [
                &firehose_messages_total,
                &firehose_decode_errors_total,
                &capacity_readings_total,
                &capacity_write_errors_total,
                &store_evicted_total,
                &store_sweep_errors_total,
            ] {
                registry.register(Box::new(c.clone()))?;
            }

            registry.register(Box::new(report_requests_total.clone()))?;

            Ok(Self {
                registry,
                app_ready,
                firehose_messages_total,
                firehose_decode_errors_total,
                capacity_readings_total,
                capacity_write_errors_total,
                capacity_cell_memory,
                store_backend_persistent,
                store_evicted_total,
                store_sweep_errors_total,
                report_requests_total,
                report_fresh_cells,
                report_watermark_memory_percent,
            })
        }

        #[cfg(not(feature = "metrics"))]
        {
            let _ = (app_id, env, config_version);
            Ok(Self { _noop: () })
        }
    }

    // --------------------------------------------------
    // Encoding
    // --------------------------------------------------
    #[cfg(feature = "metrics")]
    pub fn encode_text(&self) -> AppResult<String> {
        use prometheus::{Encoder, TextEncoder};

        let mf = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&mf, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    #[cfg(not(feature = "metrics"))]
    pub fn encode_text(&self) -> AppResult<String> {
        Err(AppError::InvalidConfig(
            "metrics feature is disabled".into(),
        ))
    }

    // --------------------------------------------------
    // Helpers (safe to call unconditionally)
    // --------------------------------------------------
    #[inline]
    pub fn set_ready(&self, ready: bool) {
        #[cfg(feature = "metrics")]
        self.app_ready.set(ready as i64);
    }

    #[inline]
    pub fn inc_firehose_message(&self) {
        #[cfg(feature = "metrics")]
        self.firehose_messages_total.inc();
    }

    #[inline]
    pub fn inc_firehose_decode_error(&self) {
        #[cfg(feature = "metrics")]
        self.firehose_decode_errors_total.inc();
    }

    #[inline]
    pub fn inc_reading(&self) {
        #[cfg(feature = "metrics")]
        self.capacity_readings_total.inc();
    }

    #[inline]
    pub fn inc_write_error(&self) {
        #[cfg(feature = "metrics")]
        self.capacity_write_errors_total.inc();
    }

    #[inline]
    pub fn set_cell_memory(&self, mib: f64) {
        #[cfg(feature = "metrics")]
        self.capacity_cell_memory.set(mib);
    }

    #[inline]
    pub fn set_backend_persistent(&self, persistent: bool) {
        #[cfg(feature = "metrics")]
        self.store_backend_persistent.set(persistent as i64);
    }

    #[inline]
    pub fn inc_evicted(&self, n: u64) {
        #[cfg(feature = "metrics")]
        self.store_evicted_total.inc_by(n);
    }

    #[inline]
    pub fn inc_sweep_error(&self) {
        #[cfg(feature = "metrics")]
        self.store_sweep_errors_total.inc();
    }

    /// One served report. `verdict` must be a fixed label, never free text.
    #[inline]
    pub fn observe_report(&self, status: u16, verdict: &str, fresh_cells: usize, percent: f64) {
        #[cfg(not(feature = "metrics"))]
        let _ = (status, verdict, fresh_cells, percent);
        #[cfg(feature = "metrics")]
        {
            let status = status.to_string();
            self.report_requests_total
                .with_label_values(&[status.as_str(), verdict])
                .inc();
            self.report_fresh_cells.set(fresh_cells as i64);
            self.report_watermark_memory_percent.set(percent);
        }
    }
}
