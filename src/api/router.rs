use axum::{Router, routing::get};

use crate::app::AppRuntime;

use super::handlers::{capacity, health};

pub fn build_router(app: AppRuntime) -> Router {
    Router::new()
        // -----------------------
        // Capacity report
        // -----------------------
        .route("/", get(capacity::index))
        .route("/cells", get(capacity::cells))
        // -----------------------
        // Liveness
        // -----------------------
        .route("/healthz", get(health::healthz))
        // ✅ ALWAYS last
        .with_state(app)
}
