use chrono::DateTime;
use regex::Regex;

use crate::error::AppResult;
use crate::ingest::config::FirehoseConfig;
use crate::ingest::envelope::Envelope;
use crate::store::MetricRecord;

pub const TOTAL_MEMORY_METRIC: &str = "CapacityTotalMemory";
pub const REMAINING_MEMORY_METRIC: &str = "CapacityRemainingMemory";

/// Typed reading handed to the sink. The core never sees raw envelopes.
#[derive(Debug, Clone, PartialEq)]
pub enum CapacityReading {
    /// Total memory of one cell. The fleet is assumed homogeneous.
    TotalMemory { cell_id: String, value: f64 },
    RemainingMemory { cell_id: String, record: MetricRecord },
}

/// Picks cell capacity readings out of the firehose.
#[derive(Debug, Clone)]
pub struct Classifier {
    cell_job: Regex,
}

impl Classifier {
    pub fn new(cell_job_pattern: &str) -> AppResult<Self> {
        Ok(Self {
            cell_job: Regex::new(cell_job_pattern)?,
        })
    }

    pub fn from_config(cfg: &FirehoseConfig) -> AppResult<Self> {
        Self::new(&cfg.cell_job_pattern)
    }

    pub fn classify(&self, env: &Envelope) -> Option<CapacityReading> {
        if !env.is_value_metric() || !self.cell_job.is_match(env.job_name()) {
            return None;
        }

        let metric = env.value_metric.as_ref()?;
        let cell_id = env.index.clone().filter(|i| !i.is_empty())?;

        match metric.name.as_str() {
            TOTAL_MEMORY_METRIC => Some(CapacityReading::TotalMemory {
                cell_id,
                value: metric.value,
            }),
            REMAINING_MEMORY_METRIC => {
                // a reading without a timestamp cannot be aged, so it is useless here
                let observed_at = DateTime::from_timestamp_nanos(env.timestamp?);
                Some(CapacityReading::RemainingMemory {
                    cell_id,
                    record: MetricRecord::new(metric.value, observed_at),
                })
            }
            _ => None,
        }
    }
}
