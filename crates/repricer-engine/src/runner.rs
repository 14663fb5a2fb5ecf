//! The per-tick batch runner.
//!
//! One invocation processes at most one catalog page and at most
//! `variant_quota` variants, then persists the job record and returns. The
//! cron scheduler re-invoking `run_tick` is the only loop; it is also the
//! retry mechanism for failed page fetches.

use chrono::Utc;

use repricer_core::{AppConfig, JobMode, JobStore, NewLogEntry, OutcomeStatus, PriceJob};
use repricer_shopify::{AdminClient, ShopifyError, Throttle};

use crate::error::EngineError;
use crate::resolver;

/// Per-tick work bounds, fixed by configuration rather than stored with
/// the job.
#[derive(Debug, Clone, Copy)]
pub struct TickLimits {
    pub page_size: u32,
    pub variant_quota: u32,
    pub throttle_ms: u64,
    pub cursor_reset_limit: i32,
}

impl TickLimits {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            page_size: config.page_size,
            variant_quota: config.variant_quota,
            throttle_ms: config.throttle_ms,
            cursor_reset_limit: config.cursor_reset_limit,
        }
    }
}

/// What one tick did; the scheduler logs this and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No job record, or the job is not running.
    Idle,
    /// Work done, more catalog remains.
    Progressed { variants_evaluated: u32 },
    /// The catalog walk finished; the job was marked not running.
    Completed { variants_evaluated: u32 },
    /// The stored cursor was rejected; the walk restarts from the origin
    /// on the next tick.
    CursorRestarted { resets: i32 },
    /// The restart budget is spent; the job was stopped.
    ResetLimitExceeded,
    /// The page fetch failed; the message was recorded and the job left
    /// running for the next tick to retry.
    RemoteErrorRecorded,
}

/// Run one bounded tick of the active job.
///
/// 1. Load the job; absent or stopped → [`TickOutcome::Idle`].
/// 2. Fetch one page at the stored cursor (catalog origin when `None`).
///    Cursor invalidation and other fetch failures take the recovery
///    paths described on [`TickOutcome`].
/// 3. An empty page completes the job.
/// 4. Walk products and variants up to `variant_quota` fully-evaluated
///    variants, appending one log entry per evaluation.
/// 5. Persist the advanced cursor, counters, and `last_msg`. The job stops
///    only when the final page was reached with quota to spare; quota
///    exhausted exactly at the final page wraps around to the origin,
///    which is harmless because seeding is idempotent.
///
/// # Errors
///
/// Only store failures propagate. Remote failures are recorded in the job
/// record instead, because the next scheduled tick retries them naturally.
pub async fn run_tick(
    store: &dyn JobStore,
    client: &AdminClient,
    limits: &TickLimits,
) -> Result<TickOutcome, EngineError> {
    let Some(mut job) = store.load_job().await? else {
        return Ok(TickOutcome::Idle);
    };
    if !job.running {
        return Ok(TickOutcome::Idle);
    }

    let mut pacer = Throttle::from_millis(limits.throttle_ms);

    let page = match client
        .fetch_products_page(limits.page_size, job.cursor.as_deref())
        .await
    {
        Ok(page) => page,
        Err(ShopifyError::CursorInvalid { cursor }) => {
            return recover_from_stale_cursor(store, job, &cursor, limits).await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "catalog page fetch failed; next tick retries");
            job.last_run_at = Some(Utc::now());
            job.last_msg = format!("page fetch failed: {e}");
            store.save_job(&job).await?;
            return Ok(TickOutcome::RemoteErrorRecorded);
        }
    };

    if page.products.is_empty() {
        job.running = false;
        job.cursor = None;
        job.last_run_at = Some(Utc::now());
        job.last_msg = completion_message(&job);
        store.save_job(&job).await?;
        tracing::info!(msg = %job.last_msg, "price job finished");
        return Ok(TickOutcome::Completed {
            variants_evaluated: 0,
        });
    }

    let mut evaluated: u32 = 0;
    'products: for product in &page.products {
        if evaluated >= limits.variant_quota {
            break 'products;
        }
        job.processed_products += 1;

        for variant in &product.variants {
            if evaluated >= limits.variant_quota {
                break 'products;
            }

            // Variants without a positive current price are passed over
            // without consuming quota or appearing in the log.
            let Some(current) = parse_positive_price(&variant.price) else {
                continue;
            };
            job.processed_variants += 1;

            match job.mode {
                JobMode::Update => {
                    if update_variant(store, client, &mut pacer, &mut job, product, variant, current)
                        .await?
                    {
                        evaluated += 1;
                    }
                }
                JobMode::ResetBase => {
                    if reset_variant(store, client, &mut pacer, &mut job, product, variant, current)
                        .await?
                    {
                        evaluated += 1;
                    }
                }
            }
        }
    }

    job.cursor = page.next_cursor;
    job.last_run_at = Some(Utc::now());
    let quota_exhausted = evaluated >= limits.variant_quota;
    if job.cursor.is_none() && !quota_exhausted {
        job.running = false;
        job.last_msg = completion_message(&job);
    } else {
        job.last_msg = format!(
            "processed {evaluated} variants this run ({} total)",
            job.processed_variants
        );
    }
    store.save_job(&job).await?;

    if job.running {
        Ok(TickOutcome::Progressed {
            variants_evaluated: evaluated,
        })
    } else {
        tracing::info!(msg = %job.last_msg, "price job finished");
        Ok(TickOutcome::Completed {
            variants_evaluated: evaluated,
        })
    }
}

/// Evaluate one variant of an `update` job. Returns whether quota was
/// consumed, which is false exactly when no usable base existed or the
/// resolver hit a transport failure.
async fn update_variant(
    store: &dyn JobStore,
    client: &AdminClient,
    pacer: &mut Throttle,
    job: &mut PriceJob,
    product: &repricer_shopify::Product,
    variant: &repricer_shopify::Variant,
    current: f64,
) -> Result<bool, EngineError> {
    let resolved =
        match resolver::resolve_base(client, pacer, variant.id, current, job.rate).await {
            Ok(Some(resolved)) => resolved,
            Ok(None) => return Ok(false),
            Err(e) => {
                tracing::warn!(
                    variant_id = variant.id,
                    error = %e,
                    "base price resolution failed; variant skipped"
                );
                return Ok(false);
            }
        };

    let target = repricer_core::pricing::compute_price(
        resolved.base_usd,
        job.rate,
        job.margin,
        job.round_step,
    );
    let before = rounded(current);

    let mut wrote = false;
    if price_diff(target, current) >= 1.0 {
        pacer.ready().await;
        match client.update_variant_price(variant.id, target).await {
            Ok(()) => wrote = true,
            Err(e) => {
                tracing::warn!(
                    variant_id = variant.id,
                    target,
                    error = %e,
                    "price write failed; recorded as skipped"
                );
            }
        }
    }

    if wrote {
        job.updated_variants += 1;
    }
    if resolved.seeded {
        job.seeded_variants += 1;
    }
    let status = if wrote {
        OutcomeStatus::Updated
    } else if resolved.seeded {
        OutcomeStatus::Seeded
    } else {
        OutcomeStatus::Skipped
    };

    store
        .append_log(NewLogEntry {
            product: product.title.clone(),
            variant_id: variant.id,
            price_before: Some(before),
            price_after: Some(target),
            status,
        })
        .await?;

    Ok(true)
}

/// Evaluate one variant of a `reset_base` job. Returns whether quota was
/// consumed; transport failures skip the variant without consuming it.
async fn reset_variant(
    store: &dyn JobStore,
    client: &AdminClient,
    pacer: &mut Throttle,
    job: &mut PriceJob,
    product: &repricer_shopify::Product,
    variant: &repricer_shopify::Variant,
    current: f64,
) -> Result<bool, EngineError> {
    let written =
        match resolver::reset_base_price(client, pacer, variant.id, current, job.rate).await {
            Ok(written) => written,
            Err(e) => {
                tracing::warn!(
                    variant_id = variant.id,
                    error = %e,
                    "base price reset failed; variant skipped"
                );
                return Ok(false);
            }
        };

    let status = if written.is_some() {
        job.seeded_variants += 1;
        OutcomeStatus::BaseReset
    } else {
        OutcomeStatus::Skipped
    };

    let price = rounded(current);
    store
        .append_log(NewLogEntry {
            product: product.title.clone(),
            variant_id: variant.id,
            price_before: Some(price),
            price_after: Some(price),
            status,
        })
        .await?;

    Ok(true)
}

async fn recover_from_stale_cursor(
    store: &dyn JobStore,
    mut job: PriceJob,
    cursor: &str,
    limits: &TickLimits,
) -> Result<TickOutcome, EngineError> {
    job.cursor_resets += 1;
    job.last_run_at = Some(Utc::now());

    if job.cursor_resets <= limits.cursor_reset_limit {
        tracing::warn!(
            cursor,
            resets = job.cursor_resets,
            limit = limits.cursor_reset_limit,
            "stored cursor rejected; restarting the walk from the origin"
        );
        job.cursor = None;
        job.last_msg = format!(
            "cursor expired, restarting from the top (reset {} of {})",
            job.cursor_resets, limits.cursor_reset_limit
        );
        store.save_job(&job).await?;
        return Ok(TickOutcome::CursorRestarted {
            resets: job.cursor_resets,
        });
    }

    tracing::error!(
        resets = job.cursor_resets,
        limit = limits.cursor_reset_limit,
        "cursor restart budget spent; stopping the job"
    );
    job.running = false;
    job.last_msg = format!(
        "stopped: pagination cursor invalidated {} times (limit {})",
        job.cursor_resets, limits.cursor_reset_limit
    );
    store.save_job(&job).await?;
    Ok(TickOutcome::ResetLimitExceeded)
}

fn completion_message(job: &PriceJob) -> String {
    format!(
        "job complete: {} products walked, {} variants processed, {} updated, {} seeded",
        job.processed_products, job.processed_variants, job.updated_variants, job.seeded_variants
    )
}

fn parse_positive_price(raw: &str) -> Option<f64> {
    repricer_core::numeric::parse_flexible(raw).filter(|price| *price > 0.0)
}

#[allow(clippy::cast_possible_truncation)]
fn rounded(price: f64) -> i64 {
    price.round() as i64
}

#[allow(clippy::cast_precision_loss)]
fn price_diff(target: i64, current: f64) -> f64 {
    (target as f64 - current).abs()
}
