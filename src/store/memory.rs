use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::AppResult;

use super::backend::MetricBackend;
use super::types::{BackendKind, MetricRecord};

/// Volatile backend: lost on restart, owned by the store.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<String, MetricRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn set(&self, cell_id: &str, record: MetricRecord) -> AppResult<()> {
        self.records
            .write()
            .await
            .insert(cell_id.to_string(), record);
        Ok(())
    }

    async fn get(&self, cell_id: &str) -> AppResult<Option<MetricRecord>> {
        Ok(self.records.read().await.get(cell_id).copied())
    }

    async fn get_all(&self) -> AppResult<HashMap<String, MetricRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn delete(&self, cell_id: &str) -> AppResult<()> {
        self.records.write().await.remove(cell_id);
        Ok(())
    }

    async fn delete_if_older(&self, cell_id: &str, cutoff: DateTime<Utc>) -> AppResult<bool> {
        let mut records = self.records.write().await;
        let stale = records
            .get(cell_id)
            .is_some_and(|rec| rec.observed_at < cutoff);
        if stale {
            records.remove(cell_id);
        }
        Ok(stale)
    }
}
