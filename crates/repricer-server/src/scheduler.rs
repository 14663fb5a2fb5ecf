//! Background tick scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring engine tick. The schedule drives the job; the HTTP surface
//! only starts, inspects, and cancels it.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use repricer_core::AppConfig;
use repricer_db::PgJobStore;
use repricer_engine::{run_tick, TickLimits, TickOutcome};
use repricer_shopify::AdminClient;

/// Builds and starts the background tick scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process; dropping it stops the schedule.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the tick job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    client: Arc<AdminClient>,
    config: Arc<AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_tick_job(&scheduler, pool, client, &config).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the recurring engine tick.
///
/// Fires every `cron_minutes` minutes on the minute. Each firing walks
/// one bounded batch of the active price job, if any.
async fn register_tick_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    client: Arc<AdminClient>,
    config: &Arc<AppConfig>,
) -> Result<(), JobSchedulerError> {
    let store = Arc::new(PgJobStore::new(pool, config.log_cap));
    let limits = TickLimits::from_app_config(config);
    let schedule = cron_schedule(config.cron_minutes);

    let job = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
        let store = Arc::clone(&store);
        let client = Arc::clone(&client);

        Box::pin(async move {
            run_scheduled_tick(store.as_ref(), &client, &limits).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

fn cron_schedule(cron_minutes: i64) -> String {
    format!("0 */{cron_minutes} * * * *")
}

/// Run one tick and log what it did. Tick failures never propagate; the
/// next firing retries from the persisted job state.
async fn run_scheduled_tick(store: &PgJobStore, client: &AdminClient, limits: &TickLimits) {
    match run_tick(store, client, limits).await {
        Ok(TickOutcome::Idle) => {
            tracing::debug!("scheduler: no running job");
        }
        Ok(TickOutcome::Progressed { variants_evaluated }) => {
            tracing::info!(variants_evaluated, "scheduler: tick progressed");
        }
        Ok(TickOutcome::Completed { variants_evaluated }) => {
            tracing::info!(variants_evaluated, "scheduler: job completed");
        }
        Ok(TickOutcome::CursorRestarted { resets }) => {
            tracing::warn!(resets, "scheduler: stale cursor, restarting from the origin");
        }
        Ok(TickOutcome::ResetLimitExceeded) => {
            tracing::error!("scheduler: cursor reset budget spent, job stopped");
        }
        Ok(TickOutcome::RemoteErrorRecorded) => {
            tracing::warn!("scheduler: page fetch failed, retrying next tick");
        }
        Err(e) => {
            tracing::error!(error = %e, "scheduler: tick failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cron_schedule_fires_on_the_minute() {
        assert_eq!(cron_schedule(2), "0 */2 * * * *");
        assert_eq!(cron_schedule(15), "0 */15 * * * *");
    }
}
