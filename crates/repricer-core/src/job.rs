use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// What the batch does to each variant it visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    /// Recompute and write sale prices from the stored USD base.
    Update,
    /// Derive the USD base from the current sale price and store it,
    /// overwriting whatever base was there.
    ResetBase,
}

impl JobMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobMode::Update => "update",
            JobMode::ResetBase => "reset_base",
        }
    }
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update" => Ok(JobMode::Update),
            "reset_base" => Ok(JobMode::ResetBase),
            other => Err(CoreError::InvalidJobMode(other.to_string())),
        }
    }
}

/// Outcome recorded for a variant the batch fully evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Sale price rewritten.
    Updated,
    /// USD base seeded this pass; price left alone.
    Seeded,
    /// Nothing written (within threshold, or the write failed).
    Skipped,
    /// USD base overwritten by a `reset_base` job.
    BaseReset,
    /// USD base written through the manual edit endpoint.
    BaseManualSet,
}

impl OutcomeStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeStatus::Updated => "updated",
            OutcomeStatus::Seeded => "seeded",
            OutcomeStatus::Skipped => "skipped",
            OutcomeStatus::BaseReset => "base_reset",
            OutcomeStatus::BaseManualSet => "base_manual_set",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutcomeStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "updated" => Ok(OutcomeStatus::Updated),
            "seeded" => Ok(OutcomeStatus::Seeded),
            "skipped" => Ok(OutcomeStatus::Skipped),
            "base_reset" => Ok(OutcomeStatus::BaseReset),
            "base_manual_set" => Ok(OutcomeStatus::BaseManualSet),
            other => Err(CoreError::InvalidOutcomeStatus(other.to_string())),
        }
    }
}

/// Parameters for a new job, already validated and with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct JobParams {
    pub mode: JobMode,
    pub rate: f64,
    pub margin: f64,
    pub round_step: f64,
    pub total_variants_hint: Option<i64>,
    pub cron_minutes: Option<i64>,
}

/// The whole state of the one batch job: parameters, pagination cursor,
/// counters, and the last outcome message. Persisting this record between
/// ticks is what makes the job resumable; deleting it cancels the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceJob {
    pub mode: JobMode,
    pub running: bool,
    /// Opaque pagination cursor. `None` means the catalog origin, either a
    /// fresh job or one that wrapped around after its final full page.
    pub cursor: Option<String>,
    pub rate: f64,
    pub margin: f64,
    pub round_step: f64,
    pub total_variants_hint: Option<i64>,
    pub cron_minutes: Option<i64>,
    pub processed_products: i64,
    pub processed_variants: i64,
    pub updated_variants: i64,
    pub seeded_variants: i64,
    /// Lifetime count of pagination-cursor-invalidation recoveries.
    pub cursor_resets: i32,
    pub started_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_msg: String,
}

impl PriceJob {
    /// Build a fresh running job. `reset_base` jobs always run with a plain
    /// 1:1 margin and no rounding step; the derived base must mirror the
    /// current price exactly.
    #[must_use]
    pub fn new(params: JobParams, started_at: DateTime<Utc>) -> Self {
        let (margin, round_step) = match params.mode {
            JobMode::Update => (params.margin, params.round_step),
            JobMode::ResetBase => (1.0, 0.0),
        };
        PriceJob {
            mode: params.mode,
            running: true,
            cursor: None,
            rate: params.rate,
            margin,
            round_step,
            total_variants_hint: params.total_variants_hint,
            cron_minutes: params.cron_minutes,
            processed_products: 0,
            processed_variants: 0,
            updated_variants: 0,
            seeded_variants: 0,
            cursor_resets: 0,
            started_at,
            last_run_at: None,
            last_msg: "queued".to_string(),
        }
    }

    /// Project time to completion from the catalog-size hint.
    ///
    /// `None` without a hint; the hint is advisory, so the projection is
    /// too.
    #[must_use]
    pub fn eta(&self, variant_quota: i64, default_cron_minutes: i64) -> Option<JobEta> {
        if variant_quota < 1 {
            return None;
        }
        let hint = self.total_variants_hint?;
        let variants_remaining = (hint - self.processed_variants).max(0);
        let batches_remaining = (variants_remaining + variant_quota - 1) / variant_quota;
        let cron = self.cron_minutes.unwrap_or(default_cron_minutes).max(1);
        Some(JobEta {
            variants_remaining,
            batches_remaining,
            eta_minutes: batches_remaining * cron,
        })
    }
}

/// Completion projection derived from the catalog-size hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobEta {
    pub variants_remaining: i64,
    pub batches_remaining: i64,
    pub eta_minutes: i64,
}

/// A not-yet-persisted run-log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLogEntry {
    pub product: String,
    pub variant_id: i64,
    pub price_before: Option<i64>,
    pub price_after: Option<i64>,
    pub status: OutcomeStatus,
}

/// One line of the capped run log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub id: i64,
    pub product: String,
    pub variant_id: i64,
    pub price_before: Option<i64>,
    pub price_after: Option<i64>,
    pub status: OutcomeStatus,
    pub logged_at: DateTime<Utc>,
}
