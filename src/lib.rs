#[cfg(feature = "axum")]
pub mod api;
pub mod app;
pub mod error;
pub mod ingest;
#[cfg(feature = "axum")]
pub mod prometheus;
pub mod redis;
pub mod store;
pub mod telemetry;

#[cfg(test)]
mod tests;
