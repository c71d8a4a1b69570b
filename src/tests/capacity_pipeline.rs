use chrono::{TimeDelta, Utc};
use prost::Message;

use crate::app::config::AppConfig;
use crate::app::runtime::AppRuntime;
use crate::error::AppResult;
use crate::ingest::envelope::Envelope;
use crate::ingest::firehose::FrameOutcome;
use crate::store::{MetricRecord, MetricStore};
use crate::telemetry::tracing::init_for_tests;

const CFG: &str = r#"
    id = "cell-capacity-monitor"
    env = "test"
    config_version = 1

    [monitor]
    watermark = "1"
    sweep_interval_sec = 900

    [firehose]
    enabled = true
    url = "wss://doppler.example.com:443"
"#;

fn remaining(index: &str, mib: f64, ts_nanos: i64) -> Vec<u8> {
    Envelope::cell_metric("diego_cell", index, "CapacityRemainingMemory", mib, Some(ts_nanos))
        .encode_to_vec()
}

fn total(index: &str, mib: f64) -> Vec<u8> {
    Envelope::cell_metric("diego-cell", index, "CapacityTotalMemory", mib, None).encode_to_vec()
}

/// Frames in, report out: the same path the firehose consumer and `GET /` take.
#[tokio::test]
async fn firehose_frames_drive_the_report() -> AppResult<()> {
    init_for_tests();

    let cfg = AppConfig::from_toml_str(CFG)?;
    let app = AppRuntime::from_parts(cfg, MetricStore::in_memory(), Utc::now() - TimeDelta::hours(1))?;
    let firehose = app.firehose_client()?;
    let now_ns = Utc::now().timestamp_nanos_opt().unwrap_or_default();

    // nothing yet
    assert_eq!(app.evaluate_now().await.status_code(), 410);

    for frame in [
        total("a", 0.0),
        total("a", 10000.0),
        remaining("a", 6321.0, now_ns),
        remaining("b", 6321.0, now_ns),
    ] {
        assert_eq!(firehose.handle_frame(&frame).await, FrameOutcome::Applied);
    }

    let eval = app.evaluate_now().await;
    println!("[pipeline] {:?} {:?}", eval.verdict, eval.report);
    assert_eq!(eval.status_code(), 200);
    assert_eq!(eval.report.cell_count, 2);
    assert_eq!(eval.report.cell_memory, 10000.0);
    assert_eq!(eval.report.watermark_memory_percent, 26.42);

    // cell b goes quiet, the sweep drops it, and the fleet is too small again
    let old_ns = (Utc::now() - TimeDelta::minutes(20))
        .timestamp_nanos_opt()
        .unwrap_or_default();
    firehose.handle_frame(&remaining("b", 6321.0, old_ns)).await;
    assert_eq!(app.store.clear_stale().await?, 1);

    let eval = app.evaluate_now().await;
    assert_eq!(eval.status_code(), 417);
    assert_eq!(
        eval.report.message,
        "The number of cells needs to exceed the watermark amount!"
    );

    #[cfg(feature = "metrics")]
    {
        let text = app.encode_prometheus_text()?;
        assert!(text.contains("capacity_readings_total 3"), "{text}");
        assert!(text.contains("store_backend_persistent 0"), "{text}");
    }

    app.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn stale_readings_are_reported_but_not_counted() -> AppResult<()> {
    let cfg = AppConfig::from_toml_str(CFG)?;
    let app = AppRuntime::from_parts(cfg, MetricStore::in_memory(), Utc::now() - TimeDelta::hours(1))?;
    app.state.observe_cell_memory(10000.0);

    let now = Utc::now();
    app.store.set("1", MetricRecord::new(6000.0, now)).await?;
    app.store.set("2", MetricRecord::new(6000.0, now - TimeDelta::minutes(16))).await?;

    let eval = app.evaluate_snapshot(&app.snapshot().await, now);
    assert_eq!(eval.report.cell_count, 1);
    assert_eq!(eval.status_code(), 417);
    assert_eq!(app.store.get_all().await?.len(), 2);

    app.shutdown().await;
    Ok(())
}
