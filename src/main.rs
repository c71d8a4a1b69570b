use cell_capacity_monitor::api::config::ApiConfig;
use cell_capacity_monitor::api::server::run_api_server;
use cell_capacity_monitor::app::config::{config_source_from_env, load_app_config};
use cell_capacity_monitor::app::runtime::AppRuntime;
use cell_capacity_monitor::error::AppResult;
use cell_capacity_monitor::prometheus::config::PrometheusConfig;
use cell_capacity_monitor::prometheus::server::run_metrics_server;
use cell_capacity_monitor::redis::config::RedisConfig;
use cell_capacity_monitor::telemetry::tracing as app_tracing;

#[tokio::main]
async fn main() -> AppResult<()> {
    let (from_env, version) = config_source_from_env()?;
    let cfg = load_app_config(from_env, version)?;

    app_tracing::init(&cfg.logging.level);

    let api_cfg = ApiConfig::load(from_env, version)?;
    let redis_cfg = RedisConfig::load(from_env, version)?;
    let prom_cfg = if cfg.metrics.enabled {
        Some(PrometheusConfig::load(from_env, version)?)
    } else {
        None
    };
    let firehose_enabled = cfg.firehose.enabled;

    let runtime = AppRuntime::new(cfg, &redis_cfg).await?;

    let api_task = run_api_server(runtime.clone(), api_cfg);

    let metrics_task = async {
        match prom_cfg {
            Some(prom_cfg) => {
                let rt = runtime.clone();
                run_metrics_server(prom_cfg, move || rt.encode_prometheus_text(), runtime.cancel_token())
                    .await
            }
            None => {
                runtime.cancel_token().cancelled().await;
                Ok(())
            }
        }
    };

    let firehose_task = async {
        if firehose_enabled {
            runtime.firehose_client()?.run(runtime.cancel_token()).await
        } else {
            tracing::info!("firehose disabled; serving reports from the shared store only");
            runtime.cancel_token().cancelled().await;
            Ok(())
        }
    };

    let res = tokio::select! {
        res = api_task => res,
        res = metrics_task => res,
        res = firehose_task => res,
    };

    runtime.shutdown().await;

    if let Err(e) = &res {
        tracing::error!(error = %e, "cell-capacity-monitor stopped with an error");
    }
    res
}
