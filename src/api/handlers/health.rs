use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Liveness only; capacity health is `GET /`.
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok\n")
}
