// src/app/health/eval.rs

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};

use super::types::{CellReport, Evaluation, HealthReport, Verdict};
use super::watermark::WatermarkSpec;
use crate::store::{MetricRecord, stale_after};

/// Remaining memory (MiB) below which a cell is flagged `low_memory`.
pub const LOW_MEMORY_MB: f64 = 2048.0;

/// Free share of non-watermark memory a migration must leave, in percent.
pub const MIN_MIGRATION_FREE_PCT: f64 = 20.0;

/// How long an empty in-memory store is not trusted to mean "no data".
pub fn init_grace() -> TimeDelta {
    TimeDelta::minutes(1)
}

/// Everything one evaluation reads. Built fresh per request; nothing is cached.
#[derive(Debug, Clone)]
pub struct CapacityInput<'a> {
    /// Raw `get_all` result; stale records are filtered here.
    pub snapshot: &'a HashMap<String, MetricRecord>,
    /// Per-cell total memory, 0 until the firehose reported it.
    pub cell_memory: f64,
    pub watermark: &'a str,
    pub persistent_store: bool,
    pub started_at: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

/// Thresholds for the decision tree. `Default` carries the production values.
#[derive(Debug, Clone, Copy)]
pub struct HealthEvaluator {
    pub stale_after: TimeDelta,
    pub low_memory_mb: f64,
    pub min_migration_free_pct: f64,
    pub init_grace: TimeDelta,
}

impl Default for HealthEvaluator {
    fn default() -> Self {
        Self {
            stale_after: stale_after(),
            low_memory_mb: LOW_MEMORY_MB,
            min_migration_free_pct: MIN_MIGRATION_FREE_PCT,
            init_grace: init_grace(),
        }
    }
}

impl HealthEvaluator {
    /// Pure function of its input. Branches are checked in order and the first
    /// match wins; the per-cell fields are filled in for every branch.
    pub fn evaluate(&self, input: &CapacityInput<'_>) -> Evaluation {
        let mut cells: Vec<CellReport> = input
            .snapshot
            .iter()
            .filter(|(_, rec)| rec.is_fresh_at(input.now, self.stale_after))
            .map(|(id, rec)| CellReport {
                index: id.clone(),
                memory: rec.remaining_memory,
                low_memory: rec.remaining_memory < self.low_memory_mb,
            })
            .collect();
        cells.sort_by(|a, b| a.index.cmp(&b.index));

        let cell_count = cells.len();
        let total_free_memory: f64 = cells.iter().map(|c| c.memory).sum();
        let low_count = cells.iter().filter(|c| c.low_memory).count();

        let mut report = HealthReport {
            healthy: false,
            message: String::new(),
            cell_reports: cells,
            cell_count,
            cell_memory: input.cell_memory,
            watermark: 0,
            requested_watermark: input.watermark.to_string(),
            total_free_memory,
            watermark_memory_percent: 0.0,
        };

        let spec = match WatermarkSpec::parse(input.watermark) {
            Ok(spec) => spec,
            Err(e) => {
                report.message = format!("{}: {e}", Verdict::InvalidWatermark.message());
                return Evaluation {
                    report,
                    verdict: Verdict::InvalidWatermark,
                };
            }
        };
        report.watermark = spec.resolve(cell_count);

        let verdict = self.decide(input, &mut report, low_count);
        report.healthy = verdict.is_healthy();
        report.message = verdict.message().to_string();

        Evaluation { report, verdict }
    }

    fn decide(&self, input: &CapacityInput<'_>, report: &mut HealthReport, low_count: usize) -> Verdict {
        if !input.persistent_store && input.now < input.started_at + self.init_grace {
            return Verdict::Initialising;
        }

        if report.cell_count == 0 {
            return Verdict::NoData;
        }

        if report.cell_count <= report.watermark {
            return Verdict::TooFewCells;
        }

        if low_count * 3 >= report.cell_count {
            return Verdict::LowMemoryCells;
        }

        // without it the percentage below divides by zero
        if report.cell_memory <= 0.0 {
            return Verdict::CellMemoryUnknown;
        }

        let percent = watermark_memory_percent(
            report.watermark,
            report.cell_count,
            report.cell_memory,
            report.total_free_memory,
        );
        report.watermark_memory_percent = percent;

        if percent <= 0.0 {
            Verdict::NoMigrationSpace
        } else if percent < self.min_migration_free_pct {
            Verdict::LowMigrationHeadroom
        } else {
            Verdict::Healthy
        }
    }
}

/// Share of non-watermark memory still free once the watermark cells are
/// removed, truncated (not rounded) to two decimals.
///
/// Returns 0 for an empty fleet. May be negative.
pub fn watermark_memory_percent(
    watermark: usize,
    cell_count: usize,
    cell_memory: f64,
    total_free_memory: f64,
) -> f64 {
    if cell_count == 0 {
        return 0.0;
    }

    let watermark_size = watermark as f64 * cell_memory;
    let memory_excluding_watermark = cell_count as f64 * cell_memory - watermark_size;
    let free_excluding_watermark = total_free_memory - watermark_size;

    let percent = free_excluding_watermark / memory_excluding_watermark * 100.0;
    (percent * 100.0).trunc() / 100.0
}
