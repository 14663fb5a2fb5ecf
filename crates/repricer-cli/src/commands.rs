//! Operator command handlers for the CLI.
//!
//! These are called from `main` after the database pool and config are
//! established. Human-readable output goes to stdout; failures propagate
//! so the process exits non-zero.

use anyhow::Context;

use repricer_core::{AppConfig, JobStore, PriceJob};
use repricer_db::PgJobStore;
use repricer_engine::{run_tick, TickLimits, TickOutcome};
use repricer_shopify::AdminClient;

/// Run one engine tick immediately, without waiting for the scheduler.
pub(crate) async fn run_tick_once(store: &PgJobStore, config: &AppConfig) -> anyhow::Result<()> {
    let client = AdminClient::new(
        &config.shopify_store_domain,
        &config.shopify_admin_token,
        &config.shopify_api_version,
        config.request_timeout_secs,
    )
    .context("building the Shopify client")?;
    let limits = TickLimits::from_app_config(config);

    match run_tick(store, &client, &limits).await? {
        TickOutcome::Idle => println!("no running job; nothing to do"),
        TickOutcome::Progressed { variants_evaluated } => {
            println!("tick done: {variants_evaluated} variants evaluated, more catalog remains");
        }
        TickOutcome::Completed { variants_evaluated } => {
            println!("job complete: {variants_evaluated} variants evaluated on the final page");
        }
        TickOutcome::CursorRestarted { resets } => {
            println!("stale cursor; the walk restarts from the top next tick (reset {resets})");
        }
        TickOutcome::ResetLimitExceeded => {
            println!("cursor reset budget spent; the job was stopped");
        }
        TickOutcome::RemoteErrorRecorded => {
            println!("page fetch failed; recorded on the job for the next tick to retry");
        }
    }
    Ok(())
}

/// Print the job record and its completion projection.
pub(crate) async fn print_status(store: &PgJobStore, config: &AppConfig) -> anyhow::Result<()> {
    let Some(job) = store.load_job().await? else {
        println!("no job record; nothing is running");
        return Ok(());
    };

    print_job(&job);
    if let Some(eta) = job.eta(i64::from(config.variant_quota), config.cron_minutes) {
        println!(
            "eta:       {} variants left, {} batches, ~{} min",
            eta.variants_remaining, eta.batches_remaining, eta.eta_minutes
        );
    }
    Ok(())
}

/// Delete the job record, the only cancellation mechanism.
pub(crate) async fn cancel(store: &PgJobStore) -> anyhow::Result<()> {
    if repricer_engine::cancel_job(store).await? {
        println!("price job cancelled");
    } else {
        println!("no job to cancel");
    }
    Ok(())
}

/// Print the newest `limit` run log entries, oldest first.
pub(crate) async fn print_log(store: &PgJobStore, limit: i64) -> anyhow::Result<()> {
    let entries = store.recent_log(limit.clamp(1, 2000)).await?;
    if entries.is_empty() {
        println!("run log is empty");
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{} [{}] {} #{} {} -> {}",
            entry.logged_at.format("%Y-%m-%d %H:%M:%S"),
            entry.status,
            entry.product,
            entry.variant_id,
            format_price(entry.price_before),
            format_price(entry.price_after),
        );
    }
    println!("{} entries", entries.len());
    Ok(())
}

fn print_job(job: &PriceJob) {
    println!("mode:      {}", job.mode);
    println!("running:   {}", job.running);
    println!("cursor:    {}", job.cursor.as_deref().unwrap_or("(origin)"));
    println!("rate:      {}", job.rate);
    println!("margin:    {}", job.margin);
    println!("step:      {}", job.round_step);
    println!(
        "progress:  {} products, {} variants ({} updated, {} seeded)",
        job.processed_products, job.processed_variants, job.updated_variants, job.seeded_variants
    );
    if job.cursor_resets > 0 {
        println!("resets:    {}", job.cursor_resets);
    }
    println!("started:   {}", job.started_at);
    if let Some(last) = job.last_run_at {
        println!("last run:  {last}");
    }
    println!("message:   {}", job.last_msg);
}

fn format_price(price: Option<i64>) -> String {
    price.map_or_else(|| "-".to_string(), |p| p.to_string())
}
