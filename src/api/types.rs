use serde::Serialize;

/// One row of `GET /cells`: every stored record, fresh or not.
#[derive(Debug, Clone, Serialize)]
pub struct CellView {
    pub index: String,
    pub memory: f64,
    /// RFC 3339.
    pub observed_at: String,
    pub age_sec: i64,
    pub stale: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CellsResp {
    pub backend: &'static str,
    pub persistent: bool,
    pub stale_after_sec: i64,
    pub cell_memory: f64,
    pub watermark: String,
    pub count: usize,
    pub cells: Vec<CellView>,
}
