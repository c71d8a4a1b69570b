use crate::error::{AppError, AppResult};
use crate::redis::config::RedisConfig;

use redis::aio::ConnectionManager;
use redis::{ConnectionInfo, RedisResult, Script};
use std::time::Duration;
use tokio::time::timeout;

const SCAN_COUNT: usize = 500;

/// Conditional delete: drop KEYS[1] only if its JSON `timestamp` (unix nanos,
/// or `Timestamp` in older values) is older than ARGV[1]. Runs atomically on
/// the server.
const DELETE_IF_OLDER_LUA: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then
  return 0
end
local ok, decoded = pcall(cjson.decode, raw)
if not ok or type(decoded) ~= 'table' then
  return 0
end
local ts = decoded.timestamp
if ts == nil then
  ts = decoded.Timestamp
end
if type(ts) ~= 'number' then
  return 0
end
if ts < tonumber(ARGV[1]) then
  redis.call('DEL', KEYS[1])
  return 1
end
return 0
"#;

/// Async Redis client for the metric store:
/// - owns a ConnectionManager (auto reconnect)
/// - enforces per-command timeouts
/// - exposes the plain key-value primitives the store backend needs
///
/// No policy logic here.
#[derive(Clone)]
pub struct RedisClient {
    pub manager: ConnectionManager,
    command_timeout: Duration,
    delete_if_older: Script,
}

impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient")
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

impl RedisClient {
    /// Connect to `target` with the timeouts from `cfg`, then PING once.
    pub async fn connect_from_config(cfg: &RedisConfig, target: ConnectionInfo) -> AppResult<Self> {
        let connect_timeout = Duration::from_millis(cfg.connection.connect_timeout_ms);
        let command_timeout = Duration::from_millis(cfg.connection.command_timeout_ms);

        let client = redis::Client::open(target)
            .map_err(|e| AppError::InvalidConfig(format!("invalid redis target: {e}")))?;

        let mgr = timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                AppError::RedisLogic(format!("redis connect timeout after {connect_timeout:?}"))
            })?
            .map_err(|e| AppError::RedisLogic(format!("redis connect error: {e}")))?;

        let this = Self {
            manager: mgr,
            command_timeout,
            delete_if_older: Script::new(DELETE_IF_OLDER_LUA),
        };
        this.ping().await?;

        Ok(this)
    }

    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = RedisResult<T>>,
    ) -> AppResult<T> {
        timeout(self.command_timeout, fut)
            .await
            .map_err(|_| {
                AppError::RedisLogic(format!(
                    "redis command timeout after {:?}",
                    self.command_timeout
                ))
            })?
            .map_err(AppError::Redis)
    }

    async fn query<T: redis::FromRedisValue>(&self, cmd: &redis::Cmd) -> AppResult<T> {
        self.with_timeout(async {
            let mut conn = self.manager.clone();
            cmd.query_async(&mut conn).await
        })
        .await
    }

    pub async fn ping(&self) -> AppResult<()> {
        let pong: String = self.query(&redis::cmd("PING")).await?;
        if pong.trim() == "PONG" {
            Ok(())
        } else {
            Err(AppError::RedisLogic(format!("PING returned '{pong}'")))
        }
    }

    pub async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.query::<()>(redis::cmd("SET").arg(key).arg(value))
            .await
    }

    pub async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.query(redis::cmd("GET").arg(key)).await
    }

    pub async fn del(&self, key: &str) -> AppResult<()> {
        self.query::<i64>(redis::cmd("DEL").arg(key)).await?;
        Ok(())
    }

    /// All keys matching `pattern`, via cursor SCAN (never KEYS).
    pub async fn scan_match(&self, pattern: &str) -> AppResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = self
                .query(
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(pattern)
                        .arg("COUNT")
                        .arg(SCAN_COUNT),
                )
                .await?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    /// Values for `keys`, positionally; `None` for keys deleted in between.
    pub async fn mget(&self, keys: &[String]) -> AppResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.query(redis::cmd("MGET").arg(keys)).await
    }

    pub async fn delete_if_older(&self, key: &str, cutoff_nanos: i64) -> AppResult<bool> {
        let removed: i64 = self
            .with_timeout(async {
                let mut conn = self.manager.clone();
                self.delete_if_older
                    .key(key)
                    .arg(cutoff_nanos)
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;
        Ok(removed == 1)
    }
}
