use axum::{
    extract::{Query, State},
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_shopify_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct BaseListQuery {
    pub q: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(super) struct BasePriceItem {
    pub variant_id: i64,
    pub product: String,
    pub sku: Option<String>,
    pub price: Option<f64>,
    pub base_usd: Option<Decimal>,
}

/// GET /api/v1/catalog/base-prices — browse stored bases straight from
/// the store; nothing is cached locally.
pub(super) async fn list_base_prices(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<BaseListQuery>,
) -> Result<Json<ApiResponse<Vec<BasePriceItem>>>, ApiError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 100);
    let search = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());

    let rows = state
        .client
        .fetch_base_list(search, limit)
        .await
        .map_err(|e| map_shopify_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| BasePriceItem {
            variant_id: row.variant_id,
            product: row.product,
            sku: row.sku,
            price: row.price,
            base_usd: row.base_usd,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
