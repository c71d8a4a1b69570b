/// Crate-wide result type.
pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // =========
    // Config / startup
    // =========
    #[error("Configuration file IO error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Failed to parse TOML config: {0}")]
    ConfigToml(#[from] toml::de::Error),

    #[error("Missing configuration field: {0}")]
    MissingConfig(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // =========
    // Firehose / WebSocket
    // =========
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid header value: {0}")]
    Header(#[from] http::header::InvalidHeaderValue),

    #[error("Firehose stream closed: {0}")]
    FirehoseClosed(String),

    #[error("Invalid classifier pattern: {0}")]
    Regex(#[from] regex::Error),

    // =========
    // CF API / UAA
    // =========
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("{service} returned HTTP {status}: {body}")]
    Api {
        service: String,
        status: http::StatusCode,
        body: String,
    },

    // =========
    // Serialization / deserialization
    // =========
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    // =========
    // Metrics / Prometheus
    // =========
    #[error("Prometheus registry error: {0}")]
    Prometheus(#[from] prometheus::Error),

    // =========
    // Storage
    // =========
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Redis logic error: {0}")]
    RedisLogic(String),

    // =========
    // Application-domain errors
    // =========
    #[error("Invalid watermark '{literal}': {reason}")]
    InvalidWatermark { literal: String, reason: String },

    #[error("Failed to spawn task: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Operation timed out")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("Internal error: {0}")]
    Internal(String),
}

// ============================
// Axum HTTP adapter
// ============================

#[cfg(feature = "axum")]
mod axum_impl {
    use super::AppError;
    use axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    use serde::Serialize;

    /// Thin HTTP wrapper so core errors don't depend on HTTP.
    #[derive(Debug)]
    pub struct ApiError(pub AppError);

    #[derive(Debug, Serialize)]
    struct ErrorBody {
        error: String,
        kind: &'static str,
    }

    impl From<AppError> for ApiError {
        fn from(e: AppError) -> Self {
            Self(e)
        }
    }

    impl IntoResponse for ApiError {
        fn into_response(self) -> Response {
            let (status, kind, msg) = map_error(&self.0);
            (status, Json(ErrorBody { error: msg, kind })).into_response()
        }
    }

    pub(super) fn map_error(e: &AppError) -> (StatusCode, &'static str, String) {
        match e {
            AppError::InvalidWatermark { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "invalid_watermark",
                e.to_string(),
            ),
            AppError::MissingConfig(field) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "missing_config",
                field.to_string(),
            ),
            AppError::InvalidConfig(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "invalid_config",
                msg.clone(),
            ),

            AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout", e.to_string()),

            AppError::Api { .. } => (StatusCode::BAD_GATEWAY, "upstream_api", e.to_string()),

            // Storage / upstream transport
            AppError::Redis(_)
            | AppError::RedisLogic(_)
            | AppError::WebSocket(_)
            | AppError::Reqwest(_) => {
                (StatusCode::BAD_GATEWAY, "upstream_transport", e.to_string())
            }

            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string()),
        }
    }

    pub use ApiError as AxumError;
}

#[cfg(feature = "axum")]
pub use axum_impl::AxumError as ApiError;
