//! Cloud Foundry login: endpoint discovery via `/v2/info` and a UAA password
//! grant for the firehose bearer token.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::info;

use crate::error::{AppError, AppResult};

/// Public OAuth client the cf CLI uses; it has an empty secret.
const CF_CLIENT_ID: &str = "cf";

fn default_token_type() -> String {
    "bearer".to_string()
}

/// The parts of `GET /v2/info` the monitor needs.
#[derive(Debug, Clone, Deserialize)]
pub struct CfInfo {
    pub token_endpoint: String,
    #[serde(default)]
    pub doppler_logging_endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl OAuthToken {
    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type.to_ascii_lowercase(), self.access_token)
    }
}

/// Admin credentials for the CF API.
#[derive(Clone)]
pub struct CfCredentials {
    pub api: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for CfCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CfCredentials")
            .field("api", &self.api)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct CfClient {
    http: Client,
    api: String,
    timeout: Duration,
}

impl CfClient {
    pub fn new(api: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            api: api.into().trim().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub async fn info(&self) -> AppResult<CfInfo> {
        let rb = self.http.get(format!("{}/v2/info", self.api));
        self.execute_json(rb, "cf-api").await
    }

    /// Resource-owner password grant against the UAA named by `info`.
    pub async fn password_token(
        &self,
        info: &CfInfo,
        username: &str,
        password: &str,
    ) -> AppResult<OAuthToken> {
        let url = format!(
            "{}/oauth/token",
            info.token_endpoint.trim().trim_end_matches('/')
        );
        let rb = self
            .http
            .post(url)
            .basic_auth(CF_CLIENT_ID, Some(""))
            .form(&[
                ("grant_type", "password"),
                ("username", username),
                ("password", password),
            ]);
        self.execute_json(rb, "uaa").await
    }

    /// `info` then `password_token`, the same handshake `cf login` does.
    pub async fn login(&self, creds: &CfCredentials) -> AppResult<(CfInfo, OAuthToken)> {
        let info = self.info().await?;
        let token = self
            .password_token(&info, &creds.username, &creds.password)
            .await?;

        info!(
            api = %self.api,
            uaa = %info.token_endpoint,
            expires_in = ?token.expires_in,
            "cf login succeeded"
        );
        Ok((info, token))
    }

    async fn execute_json<T: serde::de::DeserializeOwned>(
        &self,
        rb: RequestBuilder,
        service: &str,
    ) -> AppResult<T> {
        let resp = rb
            .timeout(self.timeout)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Api {
                service: service.to_string(),
                status,
                body,
            });
        }

        Ok(resp.json::<T>().await?)
    }
}
