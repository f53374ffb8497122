use pickmirror_db::sync::models::SyncRun;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub data: Vec<SyncRun>,
    pub count: usize,
}
