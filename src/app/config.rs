use crate::error::{AppError, AppResult};
use crate::ingest::config::FirehoseConfig;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Env var that overrides `[monitor] watermark`.
pub const WATERMARK_ENV: &str = "WATERMARK";

const CONFIG_ENV_PREFIX: &str = "CELL_CAPACITY_MONITOR";

/// `1`/`true` switches config lookup from `src/config/` to env paths.
pub const CONFIG_FROM_ENV_ENV: &str = "CELL_CAPACITY_MONITOR_CONFIG_FROM_ENV";
/// Suffix of the per-file path env vars, see [`resolve_config_file`].
pub const CONFIG_VERSION_ENV: &str = "CELL_CAPACITY_MONITOR_CONFIG_VERSION";
const DEFAULT_K8S_DIR: &str = "/etc/cell-capacity-monitor";

fn default_watermark() -> String {
    "1".to_string()
}

fn default_sweep_interval_sec() -> u64 {
    15 * 60
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub id: String,
    pub env: String,
    pub config_version: u32,

    pub monitor: MonitorConfig,
    pub firehose: FirehoseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Absolute cell count ("2") or a percentage of the fresh cells ("10%").
    /// Kept as the raw literal: it is parsed on every report.
    #[serde(default = "default_watermark")]
    pub watermark: String,

    #[serde(default = "default_sweep_interval_sec")]
    pub sweep_interval_sec: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl AppConfig {
    pub fn from_toml_str(raw: &str) -> AppResult<Self> {
        let cfg: Self = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// `WATERMARK` wins over the file; an empty value is ignored.
    pub fn apply_watermark_override(&mut self, value: Option<String>) {
        match value.map(|v| v.trim().to_string()) {
            Some(v) if !v.is_empty() => {
                tracing::info!(
                    file = %self.monitor.watermark,
                    env = %v,
                    "watermark overridden by {WATERMARK_ENV}"
                );
                self.monitor.watermark = v;
            }
            _ => {}
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::MissingConfig("id"));
        }

        if self.config_version == 0 {
            return Err(AppError::InvalidConfig(
                "config_version must be >= 1".into(),
            ));
        }

        if self.monitor.watermark.trim().is_empty() {
            return Err(AppError::InvalidConfig(
                "monitor.watermark must not be empty".into(),
            ));
        }

        if self.monitor.sweep_interval_sec == 0 {
            return Err(AppError::InvalidConfig(
                "monitor.sweep_interval_sec must be > 0".into(),
            ));
        }

        // an hour-long sweep lets dead cells pile up for far longer than they are fresh
        if self.monitor.sweep_interval_sec > 60 * 60 {
            return Err(AppError::InvalidConfig(
                "monitor.sweep_interval_sec must be <= 3600 (1 hour)".into(),
            ));
        }

        self.firehose.validate()?;

        Ok(())
    }
}

/// Resolve the on-disk location of `<name>.toml`.
///
/// - `from_env == false`: `<crate>/src/config/<name>.toml`
/// - `from_env == true`: `CELL_CAPACITY_MONITOR_<NAME>_CONFIG_PATH_<version>`,
///   falling back to `/etc/cell-capacity-monitor/<name>.toml`
///
/// Fails fast with explicit diagnostics when the path is unusable.
pub fn resolve_config_file(name: &str, from_env: bool, version: u32) -> AppResult<PathBuf> {
    let local_default = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("src")
        .join("config")
        .join(format!("{name}.toml"));
    let k8s_default = format!("{DEFAULT_K8S_DIR}/{name}.toml");
    let key = format!(
        "{CONFIG_ENV_PREFIX}_{}_CONFIG_PATH_{version}",
        name.to_ascii_uppercase()
    );

    let (path, source): (PathBuf, &'static str) = if from_env {
        match std::env::var(&key) {
            Ok(p) => (PathBuf::from(p), "env var"),
            Err(std::env::VarError::NotPresent) => (
                PathBuf::from(&k8s_default),
                "default fallback (env var not set)",
            ),
            Err(std::env::VarError::NotUnicode(_)) => {
                return Err(AppError::InvalidConfig(format!(
                    "\n❌ {name} config path env var is not valid unicode\n\
                     ├─ env var: `{key}`\n\
                     └─ fix: set it to a valid UTF-8 path, e.g.\n\
                        export {key}={k8s_default}\n"
                )));
            }
        }
    } else {
        (local_default, "local default (from_env=false)")
    };

    match std::fs::metadata(&path) {
        Ok(meta) if meta.is_file() => Ok(path),
        Ok(_) => Err(AppError::InvalidConfig(format!(
            "\n❌ {name} config path exists but is NOT a file\n\
             ├─ path: `{}`\n\
             ├─ source: {source}\n\
             └─ fix: point to a TOML file (not a directory)\n",
            path.display()
        ))),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::InvalidConfig(format!(
            "\n❌ {name} CONFIG FILE NOT FOUND\n\
             ├─ tried path: `{}`\n\
             ├─ source: {source}\n\
             ├─ env var (if enabled): `{key}`\n\
             ├─ k8s default fallback: `{k8s_default}`\n\
             └─ fix: create the file OR set env var:\n\
                export {key}=/absolute/path/to/{name}.toml\n",
            path.display()
        ))),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            Err(AppError::InvalidConfig(format!(
                "\n❌ {name} config file exists but permission was denied\n\
                 ├─ path: `{}`\n\
                 ├─ source: {source}\n\
                 └─ os error: {e}\n",
                path.display()
            )))
        }
        Err(e) => Err(AppError::InvalidConfig(format!(
            "\n❌ Failed to stat {name} config file\n\
             ├─ path: `{}`\n\
             ├─ source: {source}\n\
             └─ os error: {e}\n",
            path.display()
        ))),
    }
}

/// `(from_env, version)` for every config loader, read from the process env.
pub fn config_source_from_env() -> AppResult<(bool, u32)> {
    let from_env = std::env::var(CONFIG_FROM_ENV_ENV)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
        .unwrap_or(false);

    let version = match std::env::var(CONFIG_VERSION_ENV) {
        Ok(v) => v.trim().parse::<u32>().map_err(|e| {
            AppError::InvalidConfig(format!("{CONFIG_VERSION_ENV}='{v}' is not a u32: {e}"))
        })?,
        Err(_) => 1,
    };

    Ok((from_env, version))
}

pub fn load_app_config(from_env: bool, version: u32) -> AppResult<AppConfig> {
    let path = resolve_config_file("app", from_env, version)?;
    let contents = std::fs::read_to_string(&path)?;

    let mut config = AppConfig::from_toml_str(&contents)?;
    config.apply_watermark_override(std::env::var(WATERMARK_ENV).ok());

    Ok(config)
}
