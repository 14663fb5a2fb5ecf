//! Starting and cancelling the singleton job.

use chrono::Utc;

use repricer_core::{JobParams, JobStore, PriceJob};

use crate::error::EngineError;

/// Create and persist a fresh running job.
///
/// At-most-one: when a running job occupies the slot the call fails and
/// the store is left untouched. A finished job record is overwritten.
///
/// # Errors
///
/// [`EngineError::AlreadyRunning`], [`EngineError::InvalidParams`], or a
/// store failure.
pub async fn start_job(store: &dyn JobStore, params: JobParams) -> Result<PriceJob, EngineError> {
    validate_params(&params)?;

    if let Some(existing) = store.load_job().await? {
        if existing.running {
            return Err(EngineError::AlreadyRunning);
        }
    }

    let job = PriceJob::new(params, Utc::now());
    store.save_job(&job).await?;
    tracing::info!(mode = %job.mode, rate = job.rate, "price job started");
    Ok(job)
}

/// Delete the job record; deleting is the only cancellation mechanism.
/// Returns whether a record existed. A tick already in flight may still
/// persist one final save.
///
/// # Errors
///
/// Store failures.
pub async fn cancel_job(store: &dyn JobStore) -> Result<bool, EngineError> {
    let existed = store.delete_job().await?;
    if existed {
        tracing::info!("price job cancelled");
    }
    Ok(existed)
}

fn validate_params(params: &JobParams) -> Result<(), EngineError> {
    if !params.rate.is_finite() || params.rate <= 0.0 {
        return Err(EngineError::invalid("rate", "must be a positive number"));
    }
    if !params.margin.is_finite() || params.margin <= 0.0 {
        return Err(EngineError::invalid("margin", "must be a positive number"));
    }
    if !params.round_step.is_finite() || params.round_step < 0.0 {
        return Err(EngineError::invalid(
            "round_step",
            "must be zero or a positive number",
        ));
    }
    if let Some(hint) = params.total_variants_hint {
        if hint < 1 {
            return Err(EngineError::invalid(
                "total_variants_hint",
                "must be at least 1",
            ));
        }
    }
    if let Some(cron) = params.cron_minutes {
        if !(1..=59).contains(&cron) {
            return Err(EngineError::invalid(
                "cron_minutes",
                "must be between 1 and 59",
            ));
        }
    }
    Ok(())
}
