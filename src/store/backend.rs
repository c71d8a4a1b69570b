use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppResult;

use super::types::{BackendKind, MetricRecord};

/// Key-value capability a `MetricStore` runs on.
///
/// Implementations must make every method safe under concurrent use by the
/// ingest writer, the sweep and any number of report handlers.
#[async_trait]
pub trait MetricBackend: Send + Sync + Debug {
    fn kind(&self) -> BackendKind;

    /// Upsert.
    async fn set(&self, cell_id: &str, record: MetricRecord) -> AppResult<()>;

    async fn get(&self, cell_id: &str) -> AppResult<Option<MetricRecord>>;

    /// Every record held, stale ones included.
    async fn get_all(&self) -> AppResult<HashMap<String, MetricRecord>>;

    /// No error on an absent key.
    async fn delete(&self, cell_id: &str) -> AppResult<()>;

    /// Remove the record only if it was observed strictly before `cutoff`,
    /// checked and removed as one step. Returns whether a record was removed.
    async fn delete_if_older(&self, cell_id: &str, cutoff: DateTime<Utc>) -> AppResult<bool>;
}
