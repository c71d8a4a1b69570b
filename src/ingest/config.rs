use crate::error::{AppError, AppResult};
use crate::ingest::cf::CfCredentials;
use serde::Deserialize;

fn default_true() -> bool {
    true
}

fn default_subscription_prefix() -> String {
    "cell-capacity-monitor".to_string()
}

fn default_cf_api_env() -> String {
    "CF_API_ENDPOINT".to_string()
}

fn default_username_env() -> String {
    "CF_USERNAME".to_string()
}

fn default_password_env() -> String {
    "CF_PASSWORD".to_string()
}

fn default_token_env() -> String {
    "FIREHOSE_TOKEN".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_cell_job_pattern() -> String {
    "diego[_-]cell".to_string()
}

/// `[firehose]` table of app.toml.
///
/// Auth: when the CF API env var is set, the monitor logs in with the admin
/// username/password env vars and discovers Doppler from `/v2/info`.
/// Otherwise it uses a pre-issued token from `token_env` and `url`.
#[derive(Debug, Clone, Deserialize)]
pub struct FirehoseConfig {
    /// Replicas sharing a Redis store can run with ingestion off.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Doppler websocket base, e.g. `wss://doppler.sys.example.com:443`.
    /// Overrides the endpoint discovered from the CF API.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_subscription_prefix")]
    pub subscription_prefix: String,

    #[serde(default = "default_cf_api_env")]
    pub cf_api_env: String,
    #[serde(default = "default_username_env")]
    pub username_env: String,
    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// Name of the env var holding a bearer token (never the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Applies to the websocket handshake and to each CF API / UAA call.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Matched against the envelope `job` to pick out cell VMs.
    #[serde(default = "default_cell_job_pattern")]
    pub cell_job_pattern: String,
}

impl FirehoseConfig {
    pub fn validate(&self) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }

        if let Some(url) = &self.url {
            let u = url.trim();
            if !u.starts_with("ws://") && !u.starts_with("wss://") {
                return Err(AppError::InvalidConfig(format!(
                    "app.toml: firehose.url '{u}' must start with ws:// or wss://"
                )));
            }
        }

        if self.subscription_prefix.trim().is_empty() {
            return Err(AppError::InvalidConfig(
                "app.toml: firehose.subscription_prefix must not be empty".into(),
            ));
        }

        for (field, value) in [
            ("cf_api_env", &self.cf_api_env),
            ("username_env", &self.username_env),
            ("password_env", &self.password_env),
            ("token_env", &self.token_env),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::InvalidConfig(format!(
                    "app.toml: firehose.{field} must not be empty"
                )));
            }
        }

        if self.connect_timeout_ms == 0 {
            return Err(AppError::InvalidConfig(
                "app.toml: firehose.connect_timeout_ms must be > 0".into(),
            ));
        }

        regex::Regex::new(&self.cell_job_pattern).map_err(|e| {
            AppError::InvalidConfig(format!(
                "app.toml: firehose.cell_job_pattern is not a valid regex: {e}"
            ))
        })?;

        Ok(())
    }

    /// CF API login details, or `None` when the API env var is unset.
    pub fn cf_credentials(&self) -> AppResult<Option<CfCredentials>> {
        let Some(api) = read_env(&self.cf_api_env)? else {
            return Ok(None);
        };

        let username = read_env(&self.username_env)?.ok_or_else(|| missing(&self.username_env))?;
        let password = read_env(&self.password_env)?.ok_or_else(|| missing(&self.password_env))?;

        Ok(Some(CfCredentials {
            api,
            username,
            password,
        }))
    }

    /// `Authorization` value built from the pre-issued token env var.
    pub fn static_authorization(&self) -> AppResult<String> {
        let token = read_env(&self.token_env)?.ok_or_else(|| {
            AppError::InvalidConfig(format!(
                "neither `{}` nor `{}` is set; the firehose needs CF admin credentials or an oauth token",
                self.cf_api_env, self.token_env
            ))
        })?;
        Ok(bearer(&token))
    }
}

/// Prefix a raw token with `bearer`, unless it already carries a scheme.
pub fn bearer(token: &str) -> String {
    let t = token.trim();
    if t.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("bearer ")) {
        t.to_string()
    } else {
        format!("bearer {t}")
    }
}

fn read_env(key: &str) -> AppResult<Option<String>> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(Some(v.trim().to_string())),
        Ok(_) | Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(AppError::InvalidConfig(format!(
            "env var `{key}` is not valid unicode"
        ))),
    }
}

fn missing(key: &str) -> AppError {
    AppError::InvalidConfig(format!(
        "env var `{key}` is required for the CF API login"
    ))
}
