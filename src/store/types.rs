use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// A reading older than this is stale: excluded from reports and swept.
pub fn stale_after() -> TimeDelta {
    TimeDelta::minutes(15)
}

/// Most recent capacity reading for one cell.
///
/// Serialized as `{"memory": <f64>, "timestamp": <unix nanos>}`, which is the
/// value format stored in Redis. The capitalised `Memory`/`Timestamp` keys
/// written by older monitors decode too.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    #[serde(rename = "memory", alias = "Memory")]
    pub remaining_memory: f64,

    #[serde(rename = "timestamp", alias = "Timestamp", with = "chrono::serde::ts_nanoseconds")]
    pub observed_at: DateTime<Utc>,
}

impl MetricRecord {
    pub fn new(remaining_memory: f64, observed_at: DateTime<Utc>) -> Self {
        Self {
            remaining_memory,
            observed_at,
        }
    }

    #[inline]
    pub fn age_at(&self, now: DateTime<Utc>) -> TimeDelta {
        now.signed_duration_since(self.observed_at)
    }

    /// Fresh iff `now - observed_at <= stale_after`.
    #[inline]
    pub fn is_fresh_at(&self, now: DateTime<Utc>, stale_after: TimeDelta) -> bool {
        self.age_at(now) <= stale_after
    }

    #[inline]
    pub fn is_stale_at(&self, now: DateTime<Utc>, stale_after: TimeDelta) -> bool {
        !self.is_fresh_at(now, stale_after)
    }
}

/// Which backend a `MetricStore` was built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Redis,
}

impl BackendKind {
    /// Survives a process restart.
    #[inline]
    pub fn is_persistent(self) -> bool {
        matches!(self, BackendKind::Redis)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Redis => "redis",
        }
    }
}
