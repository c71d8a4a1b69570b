use tracing_subscriber::{EnvFilter, fmt};

/// Initialize tracing with:
/// - `RUST_LOG` / `RUST_LOG_STYLE` support via EnvFilter
/// - `default_level` (from app.toml `[logging] level`) if RUST_LOG is not set
///
/// Call this once at startup (main).
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{default_level},hyper=warn,redis=warn,tokio_tungstenite=warn"
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .compact()
        .init();
}

/// Test-friendly init (won't panic if called multiple times).
pub fn init_for_tests() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_test_writer()
        .compact()
        .try_init();
}
