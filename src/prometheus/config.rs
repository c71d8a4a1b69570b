use crate::app::config::resolve_config_file;
use crate::error::{AppError, AppResult};
use serde::Deserialize;
use std::{fs, net::IpAddr, path::Path};

#[derive(Debug, Clone, Deserialize)]
pub struct PrometheusConfig {
    pub bind_addr: String,
    pub port: u16,
    pub metrics_path: String,
}

impl PrometheusConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_default() -> AppResult<Self> {
        Self::load(false, 0)
    }

    pub fn load(from_env: bool, version: u32) -> AppResult<Self> {
        let path = resolve_config_file("prometheus", from_env, version)?;
        Self::load_from_file(path)
    }

    pub fn validate(&self) -> AppResult<()> {
        let _ip: IpAddr = self.bind_addr.parse().map_err(|e| {
            AppError::InvalidConfig(format!(
                "prometheus.toml: bind_addr '{}' is not a valid IP: {e}",
                self.bind_addr
            ))
        })?;

        if self.port == 0 {
            return Err(AppError::InvalidConfig(
                "prometheus.toml: port must be in 1..=65535".into(),
            ));
        }

        let p = self.metrics_path.trim();
        if p.is_empty() || !p.starts_with('/') {
            return Err(AppError::InvalidConfig(
                "prometheus.toml: metrics_path must start with '/'".into(),
            ));
        }
        if p == "/healthz" {
            return Err(AppError::InvalidConfig(
                "prometheus.toml: metrics_path must not shadow /healthz".into(),
            ));
        }

        Ok(())
    }
}
