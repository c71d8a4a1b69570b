use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::AppResult;
use crate::redis::client::RedisClient;
use crate::redis::config::RedisConfig;

use super::backend::MetricBackend;
use super::memory::MemoryBackend;
use super::redis_backend::RedisBackend;
use super::types::{BackendKind, MetricRecord, stale_after};

/// Latest capacity reading per cell, over a pluggable backend.
///
/// Reads never filter by age; callers decide what "fresh" means for them
/// (`get_all` vs `is_stale`). Cloning shares the same backend.
#[derive(Debug, Clone)]
pub struct MetricStore {
    backend: Arc<dyn MetricBackend>,
    stale_after: TimeDelta,
}

impl MetricStore {
    pub fn new(backend: Arc<dyn MetricBackend>) -> Self {
        Self {
            backend,
            stale_after: stale_after(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Build the store once at startup.
    ///
    /// Redis when it is enabled, resolvable and answers PING; the in-memory
    /// backend otherwise. A redis failure here is logged, never fatal.
    pub async fn connect(cfg: &RedisConfig, vcap_services: Option<&str>) -> Self {
        let resolved = match cfg.resolve_connection(vcap_services) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "redis target could not be resolved; using in-memory store");
                return Self::in_memory();
            }
        };

        let Some((target, source)) = resolved else {
            tracing::info!("redis not configured; using in-memory store");
            return Self::in_memory();
        };

        let addr = target.addr.to_string();
        match RedisClient::connect_from_config(cfg, target).await {
            Ok(client) => {
                tracing::info!(
                    source = ?source,
                    addr = %addr,
                    key_prefix = %cfg.key_prefix,
                    scan_pattern = %cfg.scan_pattern(),
                    "metric store backed by redis"
                );
                Self::new(Arc::new(
                    RedisBackend::new(client, cfg.key_prefix.clone())
                        .with_scan_pattern(cfg.scan_pattern()),
                ))
            }
            Err(e) => {
                tracing::warn!(
                    source = ?source,
                    addr = %addr,
                    error = %e,
                    "redis unreachable at startup; falling back to in-memory store"
                );
                Self::in_memory()
            }
        }
    }

    #[inline]
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    #[inline]
    pub fn is_persistent(&self) -> bool {
        self.kind().is_persistent()
    }

    #[inline]
    pub fn stale_after(&self) -> TimeDelta {
        self.stale_after
    }

    pub async fn set(&self, cell_id: &str, record: MetricRecord) -> AppResult<()> {
        self.backend.set(cell_id, record).await
    }

    pub async fn get(&self, cell_id: &str) -> AppResult<Option<MetricRecord>> {
        self.backend.get(cell_id).await
    }

    /// Every record held, including stale ones.
    pub async fn get_all(&self) -> AppResult<HashMap<String, MetricRecord>> {
        self.backend.get_all().await
    }

    pub async fn delete(&self, cell_id: &str) -> AppResult<()> {
        self.backend.delete(cell_id).await
    }

    /// True iff the record is older than the staleness threshold.
    /// An absent cell is reported stale: it is never fresh.
    pub async fn is_stale(&self, cell_id: &str) -> AppResult<bool> {
        self.is_stale_at(cell_id, Utc::now()).await
    }

    pub async fn is_stale_at(&self, cell_id: &str, now: DateTime<Utc>) -> AppResult<bool> {
        Ok(match self.backend.get(cell_id).await? {
            Some(rec) => rec.is_stale_at(now, self.stale_after),
            None => true,
        })
    }

    /// Evict every stale record. Returns how many were removed.
    pub async fn clear_stale(&self) -> AppResult<usize> {
        self.clear_stale_at(Utc::now()).await
    }

    pub async fn clear_stale_at(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let cutoff = now - self.stale_after;
        let mut evicted = 0;

        for (cell_id, rec) in self.backend.get_all().await? {
            if !rec.is_stale_at(now, self.stale_after) {
                continue;
            }
            // re-checked by the backend: a reading that landed since get_all survives
            if self.backend.delete_if_older(&cell_id, cutoff).await? {
                tracing::debug!(cell_id = %cell_id, observed_at = %rec.observed_at, "evicted stale cell");
                evicted += 1;
            }
        }

        Ok(evicted)
    }
}
