use crate::api::server::shutdown_signal;
use crate::error::{AppError, AppResult};
use crate::prometheus::config::PrometheusConfig;

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
    routing::get,
};
use std::{net::SocketAddr, sync::Arc};
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;

type GatherFn = Arc<dyn Fn() -> AppResult<String> + Send + Sync>;

#[derive(Clone)]
struct MetricsState {
    gather: GatherFn,
    content_type: HeaderValue,
}

pub fn build_metrics_router<G>(cfg: &PrometheusConfig, gather: G) -> Router
where
    G: Fn() -> AppResult<String> + Send + Sync + 'static,
{
    let state = MetricsState {
        gather: Arc::new(gather),
        content_type: HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    };

    Router::new()
        .route(cfg.metrics_path.trim(), get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .layer(CompressionLayer::new())
        .with_state(state)
}

pub async fn run_metrics_server<G>(
    cfg: PrometheusConfig,
    gather: G,
    cancel: CancellationToken,
) -> AppResult<()>
where
    G: Fn() -> AppResult<String> + Send + Sync + 'static,
{
    let addr: SocketAddr = format!("{}:{}", cfg.bind_addr, cfg.port)
        .parse()
        .map_err(|e| AppError::InvalidConfig(format!("Invalid bind/port: {e}")))?;

    let app = build_metrics_router(&cfg, gather);

    tracing::info!(
        bind_addr = %cfg.bind_addr,
        port = cfg.port,
        path = %cfg.metrics_path,
        "prometheus metrics server starting (axum)"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind metrics server: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await
        .map_err(|e| AppError::Internal(format!("Metrics server error: {e}")))?;

    Ok(())
}

async fn metrics_handler(State(state): State<MetricsState>) -> impl IntoResponse {
    match (state.gather)() {
        Ok(text) => {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, state.content_type.clone());
            (StatusCode::OK, headers, text).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to gather metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "gather metrics failed\n").into_response()
        }
    }
}

async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    fn state(gather: impl Fn() -> AppResult<String> + Send + Sync + 'static) -> MetricsState {
        MetricsState {
            gather: Arc::new(gather),
            content_type: HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
        }
    }

    #[tokio::test]
    async fn gathered_text_is_served_as_prometheus_exposition() {
        let resp = metrics_handler(State(state(|| Ok("app_ready 1\n".to_string()))))
            .await
            .into_response();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[CONTENT_TYPE],
            "text/plain; version=0.0.4; charset=utf-8"
        );
        let body = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
        assert_eq!(&body[..], b"app_ready 1\n");
    }

    #[tokio::test]
    async fn gather_failure_is_a_500() {
        let resp = metrics_handler(State(state(|| Err(AppError::Internal("boom".into())))))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
