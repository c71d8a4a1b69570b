// src/app/health/types.rs

use serde::Serialize;

/// One fresh cell in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellReport {
    pub index: String,
    pub memory: f64,
    pub low_memory: bool,
}

/// Body of `GET /`. Field names are part of the wire contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub message: String,

    #[serde(rename = "details", skip_serializing_if = "Vec::is_empty")]
    pub cell_reports: Vec<CellReport>,

    #[serde(rename = "cellCount")]
    pub cell_count: usize,
    #[serde(rename = "cellMemory")]
    pub cell_memory: f64,
    /// Resolved watermark, in cells. 0 when the literal did not parse.
    pub watermark: usize,
    pub requested_watermark: String,
    #[serde(rename = "totalFreeMemory")]
    pub total_free_memory: f64,
    /// 0 unless the evaluation got far enough to compute it.
    #[serde(rename = "WatermarkMemoryPercent")]
    pub watermark_memory_percent: f64,
}

/// Terminal branch of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    InvalidWatermark,
    Initialising,
    NoData,
    TooFewCells,
    LowMemoryCells,
    CellMemoryUnknown,
    NoMigrationSpace,
    LowMigrationHeadroom,
    Healthy,
}

impl Verdict {
    /// HTTP-style status; the core does not depend on an HTTP crate.
    pub fn status_code(self) -> u16 {
        match self {
            Verdict::Healthy => 200,
            Verdict::NoData => 410,
            Verdict::InvalidWatermark => 500,
            Verdict::Initialising
            | Verdict::TooFewCells
            | Verdict::LowMemoryCells
            | Verdict::CellMemoryUnknown
            | Verdict::NoMigrationSpace
            | Verdict::LowMigrationHeadroom => 417,
        }
    }

    #[inline]
    pub fn is_healthy(self) -> bool {
        matches!(self, Verdict::Healthy)
    }

    /// Fixed report message. `InvalidWatermark` carries the parse error instead.
    pub fn message(self) -> &'static str {
        match self {
            Verdict::InvalidWatermark => "Error occurred while calculating cell count",
            Verdict::Initialising => "I'm still initialising, please be patient!",
            Verdict::NoData => "I'm sorry Dave I can't show you any data",
            Verdict::TooFewCells => "The number of cells needs to exceed the watermark amount!",
            Verdict::LowMemoryCells => "At least a third of the cells are low on memory!",
            Verdict::CellMemoryUnknown => {
                "Total cell memory has not been reported yet, please be patient!"
            }
            Verdict::NoMigrationSpace => {
                "FATAL - There is not enough space to do an upgrade, add cells or reduce watermark!"
            }
            Verdict::LowMigrationHeadroom => {
                "The percentage of free memory will be too low during a migration!"
            }
            Verdict::Healthy => "Everything is awesome!",
        }
    }

    /// Low-cardinality label for metrics.
    pub fn label(self) -> &'static str {
        match self {
            Verdict::InvalidWatermark => "invalid_watermark",
            Verdict::Initialising => "initialising",
            Verdict::NoData => "no_data",
            Verdict::TooFewCells => "too_few_cells",
            Verdict::LowMemoryCells => "low_memory_cells",
            Verdict::CellMemoryUnknown => "cell_memory_unknown",
            Verdict::NoMigrationSpace => "no_migration_space",
            Verdict::LowMigrationHeadroom => "low_migration_headroom",
            Verdict::Healthy => "healthy",
        }
    }
}

/// Output of one evaluation: the body plus the branch that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub report: HealthReport,
    pub verdict: Verdict,
}

impl Evaluation {
    #[inline]
    pub fn status_code(&self) -> u16 {
        self.verdict.status_code()
    }
}
