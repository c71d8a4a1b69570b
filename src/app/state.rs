use std::sync::OnceLock;

use chrono::{DateTime, Utc};

/// Inputs the evaluator needs besides the store, shared by the ingest sink and
/// the report handler.
///
/// `cell_memory` is set at most once, from the first usable
/// `CapacityTotalMemory` reading; the fleet is assumed homogeneous, so later
/// readings are ignored.
#[derive(Debug)]
pub struct CapacityState {
    cell_memory: OnceLock<f64>,
    watermark: String,
    started_at: DateTime<Utc>,
}

impl CapacityState {
    pub fn new(watermark: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            cell_memory: OnceLock::new(),
            watermark: watermark.into(),
            started_at,
        }
    }

    /// Record per-cell total memory. Returns `true` only for the reading that
    /// sets it. Zero, negative and non-finite values leave it unset.
    pub fn observe_cell_memory(&self, mib: f64) -> bool {
        if !(mib.is_finite() && mib > 0.0) {
            return false;
        }
        self.cell_memory.set(mib).is_ok()
    }

    /// Per-cell total memory, 0 until observed.
    #[inline]
    pub fn cell_memory(&self) -> f64 {
        self.cell_memory.get().copied().unwrap_or(0.0)
    }

    /// Raw literal, re-parsed on every report.
    #[inline]
    pub fn watermark(&self) -> &str {
        &self.watermark
    }

    #[inline]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
