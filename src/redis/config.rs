use crate::app::config::resolve_config_file;
use crate::error::{AppError, AppResult};
use crate::redis::vcap;
use redis::{ConnectionInfo, IntoConnectionInfo};
use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};

fn default_true() -> bool {
    true
}

fn default_key_prefix() -> String {
    "cell-capacity:".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Off means the in-memory store, always.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Look for a bound service tagged `redis` in `VCAP_SERVICES`.
    #[serde(default = "default_true")]
    pub discover_vcap: bool,

    #[serde(default)]
    pub default_node: String,

    #[serde(default)]
    pub nodes: HashMap<String, String>,
    /// Optional env var override per node key (e.g. a -> "CELL_CAPACITY_MONITOR_REDIS_A")
    #[serde(default)]
    pub nodes_env: HashMap<String, String>,

    pub connection: ConnectionConfig,

    /// Every cell record lives under `<key_prefix><cell id>`. Empty means bare
    /// cell ids, as older monitors wrote them.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// SCAN MATCH pattern for snapshots; `<key_prefix>*` when unset.
    #[serde(default)]
    pub scan_pattern: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub struct ConnectionConfig {
    pub connect_timeout_ms: u64,
    pub command_timeout_ms: u64,
}

/// Where the redis connection details came from, for the startup log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriSource {
    NodeEnv,
    Vcap,
    Nodes,
}

impl RedisConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> AppResult<Self> {
        let cfg: Self = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_default() -> AppResult<Self> {
        Self::load(false, 0)
    }

    /// - if `from_env == false`: loads `src/config/redis.toml`
    /// - if `from_env == true`: uses `CELL_CAPACITY_MONITOR_REDIS_CONFIG_PATH_{version}`
    ///   and falls back to `/etc/cell-capacity-monitor/redis.toml`
    pub fn load(from_env: bool, version: u32) -> AppResult<Self> {
        let path = resolve_config_file("redis", from_env, version)?;

        Self::load_from_file(&path).map_err(|e| {
            AppError::InvalidConfig(format!(
                "\n❌ Failed to load REDIS config\n\
                 ├─ path: `{}`\n\
                 └─ error: {}\n",
                path.display(),
                e
            ))
        })
    }

    pub fn validate(&self) -> AppResult<()> {
        // If disabled, keep validation light (parseable, but don't block startup)
        if !self.enabled {
            return Ok(());
        }

        if !self.nodes.is_empty() && !self.nodes.contains_key(self.default_node.trim()) {
            return Err(AppError::InvalidConfig(format!(
                "redis.toml: default_node '{}' not found in [nodes]",
                self.default_node
            )));
        }

        if self.nodes.is_empty() && !self.discover_vcap {
            return Err(AppError::InvalidConfig(
                "redis.toml: enabled with no [nodes] and discover_vcap=false leaves nothing to connect to"
                    .into(),
            ));
        }

        for (name, uri) in &self.nodes {
            let u = uri.trim();
            if u.is_empty() {
                return Err(AppError::InvalidConfig(format!(
                    "redis.toml: node '{name}' URI must not be empty"
                )));
            }
            if !u.starts_with("redis://") && !u.starts_with("rediss://") {
                return Err(AppError::InvalidConfig(format!(
                    "redis.toml: node '{name}' URI must start with redis:// or rediss://"
                )));
            }
        }

        if self.connection.connect_timeout_ms == 0 {
            return Err(AppError::InvalidConfig(
                "redis.toml: connection.connect_timeout_ms must be > 0".into(),
            ));
        }
        if self.connection.command_timeout_ms == 0 {
            return Err(AppError::InvalidConfig(
                "redis.toml: connection.command_timeout_ms must be > 0".into(),
            ));
        }

        if self.key_prefix.trim() != self.key_prefix {
            return Err(AppError::InvalidConfig(
                "redis.toml: key_prefix must not have surrounding whitespace".into(),
            ));
        }
        if self.key_prefix.contains(['*', '?', '[']) {
            return Err(AppError::InvalidConfig(
                "redis.toml: key_prefix must not contain glob characters".into(),
            ));
        }
        if let Some(p) = &self.scan_pattern {
            if p.trim().is_empty() {
                return Err(AppError::InvalidConfig(
                    "redis.toml: scan_pattern must not be empty when set".into(),
                ));
            }
            if !p.starts_with(self.key_prefix.as_str()) {
                return Err(AppError::InvalidConfig(format!(
                    "redis.toml: scan_pattern '{p}' must start with key_prefix '{}'",
                    self.key_prefix
                )));
            }
        }

        Ok(())
    }

    /// Pattern handed to SCAN MATCH when listing cell records.
    pub fn scan_pattern(&self) -> String {
        self.scan_pattern
            .clone()
            .unwrap_or_else(|| format!("{}*", self.key_prefix))
    }

    /// Pick what to connect to, or `None` when redis should not be used.
    ///
    /// Priority: per-node env override, then `VCAP_SERVICES` (if enabled), then `[nodes]`.
    pub fn resolve_connection(
        &self,
        vcap_services: Option<&str>,
    ) -> AppResult<Option<(ConnectionInfo, UriSource)>> {
        if !self.enabled {
            return Ok(None);
        }

        let key = self.default_node.trim();

        if let Some(env_key) = self.nodes_env.get(key) {
            match std::env::var(env_key) {
                Ok(url) if !url.trim().is_empty() => {
                    let info = parse_uri(url.trim(), env_key)?;
                    return Ok(Some((info, UriSource::NodeEnv)));
                }
                Ok(_) | Err(std::env::VarError::NotPresent) => {
                    // fall through
                }
                Err(e) => {
                    return Err(AppError::InvalidConfig(format!(
                        "redis.toml: env var '{env_key}' for default node '{key}' invalid: {e}"
                    )));
                }
            }
        }

        if self.discover_vcap {
            if let Some(raw) = vcap_services {
                if let Some(info) = vcap::redis_connection_from_vcap(raw)? {
                    return Ok(Some((info, UriSource::Vcap)));
                }
            }
        }

        self.nodes
            .get(key)
            .map(|u| parse_uri(u.trim(), key).map(|info| (info, UriSource::Nodes)))
            .transpose()
    }
}

fn parse_uri(uri: &str, origin: &str) -> AppResult<ConnectionInfo> {
    uri.into_connection_info().map_err(|e| {
        AppError::InvalidConfig(format!("redis.toml: invalid redis uri for '{origin}': {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
        enabled = true
        default_node = "a"

        [nodes]
        a = "redis://127.0.0.1:6379/0"

        [connection]
        connect_timeout_ms = 2000
        command_timeout_ms = 1000
    "#;

    #[test]
    fn load_and_print_redis_config() {
        let cfg = RedisConfig::load_default().expect("failed to load redis.toml");

        println!("=== RedisConfig ===");
        println!("{:#?}", cfg);

        println!("Redis enabled: {}", cfg.enabled);
        println!("Default node: {}", cfg.default_node);
        println!("Key prefix: {}", cfg.key_prefix);
    }

    fn tcp(info: &ConnectionInfo) -> (&str, u16) {
        match &info.addr {
            redis::ConnectionAddr::Tcp(host, port) => (host.as_str(), *port),
            other => panic!("expected a plain tcp address, got {other:?}"),
        }
    }

    #[test]
    fn disabled_redis_resolves_to_nothing() {
        let raw = BASE.replace("enabled = true", "enabled = false");
        let cfg = RedisConfig::from_toml_str(&raw).expect("config");
        assert!(cfg.resolve_connection(None).expect("resolve").is_none());
    }

    #[test]
    fn vcap_binding_beats_the_file_node() {
        let cfg = RedisConfig::from_toml_str(BASE).expect("config");
        let vcap = r#"{"p-redis":[{"name":"monitor-redis","tags":["redis","pivotal"],
            "credentials":{"host":"10.0.0.9","port":6380,"password":"pw"}}]}"#;

        let (info, source) = cfg
            .resolve_connection(Some(vcap))
            .expect("resolve")
            .expect("some connection");
        assert_eq!(source, UriSource::Vcap);
        assert_eq!(tcp(&info), ("10.0.0.9", 6380));
        assert_eq!(info.redis.password.as_deref(), Some("pw"));
    }

    #[test]
    fn file_node_is_used_without_vcap() {
        let cfg = RedisConfig::from_toml_str(BASE).expect("config");
        let (info, source) = cfg
            .resolve_connection(None)
            .expect("resolve")
            .expect("some connection");
        assert_eq!(source, UriSource::Nodes);
        assert_eq!(tcp(&info), ("127.0.0.1", 6379));
        assert_eq!(info.redis.db, 0);
    }

    #[test]
    fn unknown_default_node_is_rejected() {
        let raw = BASE.replace("default_node = \"a\"", "default_node = \"b\"");
        let err = RedisConfig::from_toml_str(&raw).unwrap_err();
        assert!(err.to_string().contains("default_node 'b'"), "got {err}");
    }

    #[test]
    fn bare_keys_need_no_prefix() {
        let raw = format!("key_prefix = \"\"\nscan_pattern = \"*-*-*-*-*\"\n{BASE}");
        let cfg = RedisConfig::from_toml_str(&raw).expect("empty prefix is allowed");
        assert_eq!(cfg.key_prefix, "");
        assert_eq!(cfg.scan_pattern(), "*-*-*-*-*");

        let cfg = RedisConfig::from_toml_str(BASE).expect("config");
        assert_eq!(cfg.scan_pattern(), "cell-capacity:*");
    }

    #[test]
    fn scan_pattern_outside_the_prefix_is_rejected() {
        let raw = format!("scan_pattern = \"other:*\"\n{BASE}");
        let err = RedisConfig::from_toml_str(&raw).unwrap_err();
        assert!(err.to_string().contains("scan_pattern"), "got {err}");
    }

    #[test]
    fn glob_characters_in_prefix_are_rejected() {
        let raw = format!("key_prefix = \"cells:*\"\n{BASE}");
        assert!(RedisConfig::from_toml_str(&raw).is_err());
    }
}
