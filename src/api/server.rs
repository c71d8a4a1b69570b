use crate::app::runtime::AppRuntime;
use crate::error::{AppError, AppResult};
use axum::Router;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;

use super::{build_router, config::ApiConfig};

pub async fn run_api_server(runtime: AppRuntime, cfg: ApiConfig) -> AppResult<()> {
    let addr: SocketAddr = format!("{}:{}", cfg.bind_addr, cfg.port)
        .parse()
        .map_err(|e| AppError::InvalidConfig(format!("api.toml: invalid bind/port: {e}")))?;

    let cancel = runtime.cancel_token();
    let app: Router = build_router(runtime);

    tracing::info!(
        bind_addr = %cfg.bind_addr,
        port = cfg.port,
        "api server starting (axum)"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind API server: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await
        .map_err(|e| AppError::Internal(format!("API server error: {e}")))?;

    Ok(())
}

/// Ctrl+C, SIGTERM (what `cf stop` sends) or runtime cancellation.
pub async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut s) = signal(SignalKind::terminate()) {
            let _ = s.recv().await;
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = sigterm => {},
        _ = cancel.cancelled() => {},
    }

    tracing::info!("api server shutdown signal received");
}
