//! Base-price resolution with seed-once semantics.
//!
//! The stored USD base is the anchor every sale price is computed from.
//! When a variant has none, its current sale price divided by the exchange
//! rate becomes the base, written back exactly once. After that the stored
//! value wins; later rate or margin changes never shift the anchor.

use rust_decimal::Decimal;

use repricer_core::numeric::parse_flexible;
use repricer_core::pricing::{derive_base_usd, to_money};
use repricer_shopify::{AdminClient, ShopifyError, Throttle};

/// A usable USD base for one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedBase {
    pub base_usd: Decimal,
    /// Whether this call wrote the base (first encounter) rather than
    /// reading an existing one.
    pub seeded: bool,
}

/// Read the variant's stored base, seeding it from `current_price / rate`
/// when absent.
///
/// `Ok(None)` means no usable base exists and none could be seeded: the
/// derived value was non-positive, or the metafield write was rejected with
/// `userErrors`. Callers skip such variants.
///
/// # Errors
///
/// Transport and HTTP failures on the read or the write propagate. A failed
/// read must never fall through to seeding — that would overwrite a base
/// that is merely unreachable right now.
pub async fn resolve_base(
    client: &AdminClient,
    pacer: &mut Throttle,
    variant_id: i64,
    current_price: f64,
    rate: f64,
) -> Result<Option<ResolvedBase>, ShopifyError> {
    pacer.ready().await;
    let stored = client.read_base_usd(variant_id).await?;

    if let Some(base) = stored
        .as_deref()
        .and_then(parse_flexible)
        .filter(|value| *value > 0.0)
        .and_then(to_money)
    {
        return Ok(Some(ResolvedBase {
            base_usd: base,
            seeded: false,
        }));
    }

    let Some(base) = derive_base_usd(current_price, rate) else {
        return Ok(None);
    };

    pacer.ready().await;
    match client.upsert_base_usd(variant_id, base).await {
        Ok(()) => Ok(Some(ResolvedBase {
            base_usd: base,
            seeded: true,
        })),
        Err(ShopifyError::MetafieldRejected { reasons }) => {
            tracing::warn!(
                variant_id,
                reasons = ?reasons,
                "base price seed rejected by the store"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Overwrite the variant's base with `round2(current_price / rate)`,
/// regardless of what is stored. The write path of `reset_base` jobs.
///
/// `Ok(None)` when the derived value is non-positive or the write was
/// rejected with `userErrors`.
///
/// # Errors
///
/// Transport and HTTP failures propagate.
pub async fn reset_base_price(
    client: &AdminClient,
    pacer: &mut Throttle,
    variant_id: i64,
    current_price: f64,
    rate: f64,
) -> Result<Option<Decimal>, ShopifyError> {
    let Some(base) = derive_base_usd(current_price, rate) else {
        return Ok(None);
    };

    pacer.ready().await;
    match client.upsert_base_usd(variant_id, base).await {
        Ok(()) => Ok(Some(base)),
        Err(ShopifyError::MetafieldRejected { reasons }) => {
            tracing::warn!(
                variant_id,
                reasons = ?reasons,
                "base price reset rejected by the store"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
