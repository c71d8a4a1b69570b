use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// Cells held back as migration headroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkSpec {
    /// `"2"`: that many cells.
    Cells(usize),
    /// `"10%"`: a share of the fresh cells, always at least one cell.
    Percent(usize),
}

impl WatermarkSpec {
    /// Anything after the first `%` is ignored; the numeric part must be a
    /// non-negative integer in both forms.
    pub fn parse(literal: &str) -> AppResult<Self> {
        let trimmed = literal.trim();
        let invalid = |e: std::num::ParseIntError| AppError::InvalidWatermark {
            literal: literal.to_string(),
            reason: e.to_string(),
        };

        match trimmed.split_once('%') {
            Some((pct, _)) => pct.parse().map(WatermarkSpec::Percent).map_err(invalid),
            None => trimmed.parse().map(WatermarkSpec::Cells).map_err(invalid),
        }
    }

    /// Watermark in cells for a fleet of `cell_count` fresh cells.
    ///
    /// Percentages are `floor(cell_count * p / 100) + 1`.
    pub fn resolve(self, cell_count: usize) -> usize {
        match self {
            WatermarkSpec::Cells(n) => n,
            WatermarkSpec::Percent(p) => cell_count.saturating_mul(p) / 100 + 1,
        }
    }
}

impl FromStr for WatermarkSpec {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for WatermarkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatermarkSpec::Cells(n) => write!(f, "{n}"),
            WatermarkSpec::Percent(p) => write!(f, "{p}%"),
        }
    }
}
