use crate::app::config::resolve_config_file;
use crate::error::{AppError, AppResult};
use serde::Deserialize;
use std::{fs, net::IpAddr, path::Path};

/// Platform-assigned listen port (Cloud Foundry, Heroku style).
pub const PORT_ENV: &str = "PORT";

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub port: u16,
}

impl ApiConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_default() -> AppResult<Self> {
        Self::load(false, 0)
    }

    /// Loads `api.toml`, then lets `PORT` override the port.
    pub fn load(from_env: bool, version: u32) -> AppResult<Self> {
        let path = resolve_config_file("api", from_env, version)?;
        let mut cfg = Self::load_from_file(&path)?;
        cfg.apply_port_override(std::env::var(PORT_ENV).ok())?;
        Ok(cfg)
    }

    pub fn apply_port_override(&mut self, value: Option<String>) -> AppResult<()> {
        let Some(raw) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
            return Ok(());
        };

        let port: u16 = raw.parse().map_err(|e| {
            AppError::InvalidConfig(format!("{PORT_ENV}='{raw}' is not a valid port: {e}"))
        })?;
        self.port = port;
        self.validate()
    }

    pub fn validate(&self) -> AppResult<()> {
        let _ip: IpAddr = self.bind_addr.parse().map_err(|e| {
            AppError::InvalidConfig(format!(
                "api.toml: bind_addr '{}' is not a valid IP: {e}",
                self.bind_addr
            ))
        })?;

        if self.port == 0 {
            return Err(AppError::InvalidConfig(
                "api.toml: port must be in 1..=65535".into(),
            ));
        }

        Ok(())
    }
}
