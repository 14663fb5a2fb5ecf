use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};

use repricer_core::{JobEta, JobMode, JobParams, JobStore, PriceJob};

use crate::middleware::RequestId;

use super::{map_engine_error, map_store_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct StartJobRequest {
    pub mode: String,
    pub rate: Option<f64>,
    pub margin: Option<f64>,
    pub round_step: Option<f64>,
    pub total_variants_hint: Option<i64>,
    pub cron_minutes: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct StartJobData {
    pub message: String,
    pub job: PriceJob,
}

#[derive(Debug, Serialize)]
pub(super) struct JobStatusData {
    pub running: bool,
    pub job: Option<PriceJob>,
    pub eta: Option<JobEta>,
}

#[derive(Debug, Serialize)]
pub(super) struct CancelData {
    pub cancelled: bool,
    pub message: &'static str,
}

/// POST /api/v1/jobs — start the price job.
///
/// Body fields beyond `mode` fall back to the configured defaults; the
/// engine validates the assembled parameters before anything is saved.
pub(super) async fn start_job(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<StartJobRequest>,
) -> Result<(StatusCode, Json<ApiResponse<StartJobData>>), ApiError> {
    let rid = &req_id.0;

    let mode: JobMode = body.mode.parse().map_err(|_| {
        ApiError::new(
            rid,
            "validation_error",
            format!("mode must be 'update' or 'reset_base', got '{}'", body.mode),
        )
    })?;
    let Some(rate) = body.rate.or(state.config.default_rate) else {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "rate is required; none supplied and no default configured",
        ));
    };

    let params = JobParams {
        mode,
        rate,
        margin: body.margin.unwrap_or(state.config.default_margin),
        round_step: body.round_step.unwrap_or(state.config.default_round_step),
        total_variants_hint: body
            .total_variants_hint
            .or(Some(state.config.total_variants_hint)),
        cron_minutes: body.cron_minutes,
    };

    let job = repricer_engine::start_job(&state.store, params)
        .await
        .map_err(|e| map_engine_error(rid.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: StartJobData {
                message: format!("{mode} job started"),
                job,
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// GET /api/v1/jobs/current — the job record plus its completion
/// projection, or a not-running shell when no record exists.
pub(super) async fn get_current_job(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<JobStatusData>>, ApiError> {
    let job = state
        .store
        .load_job()
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    let eta = job.as_ref().and_then(|job| {
        job.eta(
            i64::from(state.config.variant_quota),
            state.config.cron_minutes,
        )
    });

    Ok(Json(ApiResponse {
        data: JobStatusData {
            running: job.as_ref().is_some_and(|job| job.running),
            job,
            eta,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// DELETE /api/v1/jobs/current — cancel by deleting the record.
pub(super) async fn cancel_current_job(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<CancelData>>, ApiError> {
    let cancelled = repricer_engine::cancel_job(&state.store)
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: CancelData {
            cancelled,
            message: if cancelled {
                "price job cancelled"
            } else {
                "no job to cancel"
            },
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
