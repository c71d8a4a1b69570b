use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};

use crate::api::types::{CellView, CellsResp};
use crate::app::AppRuntime;
use crate::error::ApiError;

/// The capacity report. The status code carries the verdict.
pub async fn index(State(app): State<AppRuntime>) -> Response {
    let eval = app.evaluate_now().await;

    let status =
        StatusCode::from_u16(eval.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    tracing::debug!(
        status = status.as_u16(),
        verdict = eval.verdict.label(),
        cells = eval.report.cell_count,
        "capacity report"
    );

    (status, Json(eval.report)).into_response()
}

/// Raw view of the store, including stale records the sweep has not yet removed.
pub async fn cells(State(app): State<AppRuntime>) -> Result<Json<CellsResp>, ApiError> {
    let now = Utc::now();
    let stale_after = app.store.stale_after();

    let mut cells: Vec<CellView> = app
        .store
        .get_all()
        .await?
        .into_iter()
        .map(|(index, rec)| CellView {
            index,
            memory: rec.remaining_memory,
            observed_at: rec.observed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            age_sec: rec.age_at(now).num_seconds(),
            stale: rec.is_stale_at(now, stale_after),
        })
        .collect();
    cells.sort_by(|a, b| a.index.cmp(&b.index));

    Ok(Json(CellsResp {
        backend: app.store.kind().as_str(),
        persistent: app.store.is_persistent(),
        stale_after_sec: stale_after.num_seconds(),
        cell_memory: app.state.cell_memory(),
        watermark: app.state.watermark().to_string(),
        count: cells.len(),
        cells,
    }))
}
