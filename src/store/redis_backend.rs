use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult};
use crate::redis::client::RedisClient;

use super::backend::MetricBackend;
use super::types::{BackendKind, MetricRecord};

/// Networked backend. The store holds a connection handle only; the redis
/// server's lifecycle is not ours.
#[derive(Debug, Clone)]
pub struct RedisBackend {
    client: RedisClient,
    key_prefix: String,
    scan_pattern: String,
}

impl RedisBackend {
    pub fn new(client: RedisClient, key_prefix: impl Into<String>) -> Self {
        let key_prefix = key_prefix.into();
        Self {
            client,
            scan_pattern: format!("{key_prefix}*"),
            key_prefix,
        }
    }

    /// Narrow `get_all` to keys matching `pattern` (SCAN MATCH syntax).
    pub fn with_scan_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.scan_pattern = pattern.into();
        self
    }

    fn key(&self, cell_id: &str) -> String {
        format!("{}{}", self.key_prefix, cell_id)
    }

    fn cell_id<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.key_prefix.as_str())
    }

    fn decode(key: &str, raw: &str) -> Option<MetricRecord> {
        match serde_json::from_str(raw) {
            Ok(rec) => Some(rec),
            Err(e) => {
                tracing::warn!(key, error = %e, "skipping undecodable metric record");
                None
            }
        }
    }
}

#[async_trait]
impl MetricBackend for RedisBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Redis
    }

    async fn set(&self, cell_id: &str, record: MetricRecord) -> AppResult<()> {
        let value = serde_json::to_string(&record)?;
        self.client.set(&self.key(cell_id), &value).await
    }

    async fn get(&self, cell_id: &str) -> AppResult<Option<MetricRecord>> {
        let key = self.key(cell_id);
        Ok(self
            .client
            .get(&key)
            .await?
            .and_then(|raw| Self::decode(&key, &raw)))
    }

    async fn get_all(&self) -> AppResult<HashMap<String, MetricRecord>> {
        let keys = self.client.scan_match(&self.scan_pattern).await?;
        let values = self.client.mget(&keys).await?;

        if values.len() != keys.len() {
            return Err(AppError::RedisLogic(format!(
                "MGET returned {} values for {} keys",
                values.len(),
                keys.len()
            )));
        }

        let mut out = HashMap::with_capacity(keys.len());
        for (key, raw) in keys.iter().zip(values) {
            let (Some(cell_id), Some(raw)) = (self.cell_id(key), raw) else {
                continue;
            };
            if let Some(rec) = Self::decode(key, &raw) {
                out.insert(cell_id.to_string(), rec);
            }
        }
        Ok(out)
    }

    async fn delete(&self, cell_id: &str) -> AppResult<()> {
        self.client.del(&self.key(cell_id)).await
    }

    async fn delete_if_older(&self, cell_id: &str, cutoff: DateTime<Utc>) -> AppResult<bool> {
        let cutoff_nanos = cutoff.timestamp_nanos_opt().ok_or_else(|| {
            AppError::Internal(format!("sweep cutoff {cutoff} out of nanosecond range"))
        })?;
        self.client
            .delete_if_older(&self.key(cell_id), cutoff_nanos)
            .await
    }
}
