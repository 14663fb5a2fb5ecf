use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use repricer_core::numeric::parse_flexible;
use repricer_engine::{apply_manual_edit, ManualEditParams, PricingDefaults};
use repricer_shopify::Throttle;

use crate::middleware::RequestId;

use super::{map_engine_error, ApiError, ApiResponse, AppState, ResponseMeta};

/// Wire form of the base price. The control panel posts either a JSON
/// number or a locale-formatted string such as `"12,50"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum BaseUsdInput {
    Number(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
pub(super) struct BasePriceRequest {
    pub base_usd: BaseUsdInput,
    #[serde(default)]
    pub apply_price: bool,
    pub rate: Option<f64>,
    pub margin: Option<f64>,
    pub round_step: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(super) struct BasePriceData {
    pub variant_id: i64,
    pub base_usd: String,
    pub price: Option<i64>,
    pub message: &'static str,
}

/// POST /api/v1/variants/{variant_id}/base-price — manual base edit,
/// optionally repricing the variant in the same request.
pub(super) async fn set_base_price(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(variant_id): Path<i64>,
    Json(body): Json<BasePriceRequest>,
) -> Result<Json<ApiResponse<BasePriceData>>, ApiError> {
    let rid = &req_id.0;

    let base_usd = match &body.base_usd {
        BaseUsdInput::Number(n) => *n,
        BaseUsdInput::Text(raw) => parse_flexible(raw).ok_or_else(|| {
            ApiError::new(
                rid,
                "validation_error",
                format!("base_usd is not a number: '{raw}'"),
            )
        })?,
    };

    let params = ManualEditParams {
        variant_id,
        base_usd,
        apply_price: body.apply_price,
        rate: body.rate,
        margin: body.margin,
        round_step: body.round_step,
    };
    let defaults = PricingDefaults::from_app_config(&state.config);
    let mut pacer = Throttle::from_millis(state.config.throttle_ms);

    let outcome = apply_manual_edit(&state.store, &state.client, &mut pacer, params, &defaults)
        .await
        .map_err(|e| map_engine_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: BasePriceData {
            variant_id,
            base_usd: format!("{:.2}", outcome.base_usd),
            price: outcome.written_price,
            message: if outcome.written_price.is_some() {
                "base price written and variant repriced"
            } else {
                "base price written"
            },
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
