pub mod config;
pub mod health;
pub mod metrics;
pub mod runtime;
pub mod state;

pub use config::*;
pub use metrics::AppMetrics;
pub use runtime::AppRuntime;
pub use state::CapacityState;
