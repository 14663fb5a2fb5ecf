//! One-off operator edits of a single variant's base price.

use rust_decimal::Decimal;

use repricer_core::pricing::{compute_price, to_money};
use repricer_core::{AppConfig, JobStore, NewLogEntry, OutcomeStatus};
use repricer_shopify::{AdminClient, Throttle};

use crate::error::EngineError;

/// Fallback pricing knobs for edits that do not supply their own.
#[derive(Debug, Clone, Copy)]
pub struct PricingDefaults {
    pub rate: Option<f64>,
    pub margin: f64,
    pub round_step: f64,
}

impl PricingDefaults {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            rate: config.default_rate,
            margin: config.default_margin,
            round_step: config.default_round_step,
        }
    }
}

/// A validated manual-edit request.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualEditParams {
    pub variant_id: i64,
    /// New USD base, already normalized from its wire form.
    pub base_usd: f64,
    /// Also recompute and write the sale price.
    pub apply_price: bool,
    pub rate: Option<f64>,
    pub margin: Option<f64>,
    pub round_step: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualEditOutcome {
    pub base_usd: Decimal,
    /// The sale price written, when `apply_price` was requested.
    pub written_price: Option<i64>,
}

/// Write one variant's base price by hand, optionally repricing it in the
/// same breath.
///
/// All validation happens before any remote call. Exactly one log entry is
/// appended, status `base_manual_set`, product `"(manual)"`; job counters
/// are untouched because manual edits are not part of any batch.
///
/// # Errors
///
/// [`EngineError::InvalidParams`] for a non-positive base, a non-positive
/// override, or `apply_price` without any usable rate;
/// [`EngineError::Shopify`] when a remote write fails (a rejected
/// metafield write surfaces as
/// [`repricer_shopify::ShopifyError::MetafieldRejected`]);
/// store failures from the log append.
pub async fn apply_manual_edit(
    store: &dyn JobStore,
    client: &AdminClient,
    pacer: &mut Throttle,
    params: ManualEditParams,
    defaults: &PricingDefaults,
) -> Result<ManualEditOutcome, EngineError> {
    let Some(base) = to_money(params.base_usd).filter(|base| *base > Decimal::ZERO) else {
        return Err(EngineError::invalid(
            "base_usd",
            "must be a positive number",
        ));
    };

    let pricing = params
        .apply_price
        .then(|| resolve_pricing(&params, defaults))
        .transpose()?;

    pacer.ready().await;
    client.upsert_base_usd(params.variant_id, base).await?;

    let mut written_price = None;
    if let Some((rate, margin, round_step)) = pricing {
        let target = compute_price(base, rate, margin, round_step);
        pacer.ready().await;
        client.update_variant_price(params.variant_id, target).await?;
        written_price = Some(target);
    }

    store
        .append_log(NewLogEntry {
            product: "(manual)".to_string(),
            variant_id: params.variant_id,
            price_before: None,
            price_after: written_price,
            status: OutcomeStatus::BaseManualSet,
        })
        .await?;

    tracing::info!(
        variant_id = params.variant_id,
        base = %base,
        price = ?written_price,
        "manual base price edit applied"
    );

    Ok(ManualEditOutcome {
        base_usd: base,
        written_price,
    })
}

fn resolve_pricing(
    params: &ManualEditParams,
    defaults: &PricingDefaults,
) -> Result<(f64, f64, f64), EngineError> {
    let Some(rate) = params.rate.or(defaults.rate) else {
        return Err(EngineError::invalid(
            "rate",
            "required to apply the price; none supplied and no default configured",
        ));
    };
    if !rate.is_finite() || rate <= 0.0 {
        return Err(EngineError::invalid("rate", "must be a positive number"));
    }

    let margin = params.margin.unwrap_or(defaults.margin);
    if !margin.is_finite() || margin <= 0.0 {
        return Err(EngineError::invalid("margin", "must be a positive number"));
    }

    let round_step = params.round_step.unwrap_or(defaults.round_step);
    if !round_step.is_finite() || round_step < 0.0 {
        return Err(EngineError::invalid(
            "round_step",
            "must be zero or a positive number",
        ));
    }

    Ok((rate, margin, round_step))
}
