use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use repricer_core::{JobStore, RunLogEntry};

use crate::middleware::RequestId;

use super::{map_store_error, normalize_log_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct LogQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct ClearLogData {
    pub removed: u64,
    pub message: String,
}

/// GET /api/v1/log — the newest entries, oldest first.
pub(super) async fn list_run_log(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<LogQuery>,
) -> Result<Json<ApiResponse<Vec<RunLogEntry>>>, ApiError> {
    let entries = state
        .store
        .recent_log(normalize_log_limit(query.limit))
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: entries,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// DELETE /api/v1/log — drop every entry, reporting how many went.
pub(super) async fn clear_run_log(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<ClearLogData>>, ApiError> {
    let removed = state
        .store
        .clear_log()
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: ClearLogData {
            removed,
            message: format!("cleared {removed} log entries"),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
