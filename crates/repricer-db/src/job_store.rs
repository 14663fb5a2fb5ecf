//! Postgres-backed [`JobStore`] over the `price_job` and `run_log` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use repricer_core::{JobStore, NewLogEntry, PriceJob, RunLogEntry, StoreError};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// The singleton row of the `price_job` table, minus its fixed key.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PriceJobRow {
    pub mode: String,
    pub running: bool,
    /// Named `page_cursor` in the schema; `cursor` is reserved in SQL.
    pub page_cursor: Option<String>,
    pub rate: f64,
    pub margin: f64,
    pub round_step: f64,
    pub total_variants_hint: Option<i64>,
    pub cron_minutes: Option<i64>,
    pub processed_products: i64,
    pub processed_variants: i64,
    pub updated_variants: i64,
    pub seeded_variants: i64,
    pub cursor_resets: i32,
    pub started_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_msg: String,
}

/// A row from the `run_log` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RunLogRow {
    pub id: i64,
    pub product: String,
    pub variant_id: i64,
    pub price_before: Option<i64>,
    pub price_after: Option<i64>,
    pub status: String,
    pub logged_at: DateTime<Utc>,
}

/// Decode a stored job row into the domain record.
///
/// # Errors
///
/// Returns [`repricer_core::CoreError`] when the stored `mode` tag is not
/// one the domain knows; that only happens if the table was edited by hand.
pub fn job_from_row(row: PriceJobRow) -> Result<PriceJob, repricer_core::CoreError> {
    Ok(PriceJob {
        mode: row.mode.parse()?,
        running: row.running,
        cursor: row.page_cursor,
        rate: row.rate,
        margin: row.margin,
        round_step: row.round_step,
        total_variants_hint: row.total_variants_hint,
        cron_minutes: row.cron_minutes,
        processed_products: row.processed_products,
        processed_variants: row.processed_variants,
        updated_variants: row.updated_variants,
        seeded_variants: row.seeded_variants,
        cursor_resets: row.cursor_resets,
        started_at: row.started_at,
        last_run_at: row.last_run_at,
        last_msg: row.last_msg,
    })
}

/// Decode a stored log row into the domain record.
///
/// # Errors
///
/// Returns [`repricer_core::CoreError`] when the stored `status` tag is
/// unknown.
pub fn log_entry_from_row(row: RunLogRow) -> Result<RunLogEntry, repricer_core::CoreError> {
    Ok(RunLogEntry {
        id: row.id,
        product: row.product,
        variant_id: row.variant_id,
        price_before: row.price_before,
        price_after: row.price_after,
        status: row.status.parse()?,
        logged_at: row.logged_at,
    })
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Durable job store. One `price_job` row keyed `'current'`, plus a
/// `run_log` table trimmed to `log_cap` rows on every append.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
    log_cap: i64,
}

impl PgJobStore {
    #[must_use]
    pub fn new(pool: PgPool, log_cap: i64) -> Self {
        Self {
            pool,
            log_cap: log_cap.max(1),
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn load_job(&self) -> Result<Option<PriceJob>, StoreError> {
        let row = sqlx::query_as::<_, PriceJobRow>(
            "SELECT mode, running, page_cursor, rate, margin, round_step, \
                    total_variants_hint, cron_minutes, processed_products, \
                    processed_variants, updated_variants, seeded_variants, \
                    cursor_resets, started_at, last_run_at, last_msg \
             FROM price_job \
             WHERE job_key = 'current'",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.map(job_from_row)
            .transpose()
            .map_err(StoreError::backend)
    }

    async fn save_job(&self, job: &PriceJob) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO price_job \
                 (job_key, mode, running, page_cursor, rate, margin, round_step, \
                  total_variants_hint, cron_minutes, processed_products, \
                  processed_variants, updated_variants, seeded_variants, \
                  cursor_resets, started_at, last_run_at, last_msg) \
             VALUES ('current', $1, $2, $3, $4, $5, $6, \
                     $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             ON CONFLICT (job_key) DO UPDATE SET \
                 mode                = EXCLUDED.mode, \
                 running             = EXCLUDED.running, \
                 page_cursor         = EXCLUDED.page_cursor, \
                 rate                = EXCLUDED.rate, \
                 margin              = EXCLUDED.margin, \
                 round_step          = EXCLUDED.round_step, \
                 total_variants_hint = EXCLUDED.total_variants_hint, \
                 cron_minutes        = EXCLUDED.cron_minutes, \
                 processed_products  = EXCLUDED.processed_products, \
                 processed_variants  = EXCLUDED.processed_variants, \
                 updated_variants    = EXCLUDED.updated_variants, \
                 seeded_variants     = EXCLUDED.seeded_variants, \
                 cursor_resets       = EXCLUDED.cursor_resets, \
                 started_at          = EXCLUDED.started_at, \
                 last_run_at         = EXCLUDED.last_run_at, \
                 last_msg            = EXCLUDED.last_msg, \
                 updated_at          = NOW()",
        )
        .bind(job.mode.as_str())
        .bind(job.running)
        .bind(&job.cursor)
        .bind(job.rate)
        .bind(job.margin)
        .bind(job.round_step)
        .bind(job.total_variants_hint)
        .bind(job.cron_minutes)
        .bind(job.processed_products)
        .bind(job.processed_variants)
        .bind(job.updated_variants)
        .bind(job.seeded_variants)
        .bind(job.cursor_resets)
        .bind(job.started_at)
        .bind(job.last_run_at)
        .bind(&job.last_msg)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(())
    }

    async fn delete_job(&self) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM price_job WHERE job_key = 'current'")
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        Ok(result.rows_affected() > 0)
    }

    async fn append_log(&self, entry: NewLogEntry) -> Result<(), StoreError> {
        // The trimming CTE sees the pre-insert table, so keeping the newest
        // cap - 1 old rows leaves exactly cap rows once the insert lands.
        sqlx::query(
            "WITH inserted AS ( \
                 INSERT INTO run_log (product, variant_id, price_before, price_after, status) \
                 VALUES ($1, $2, $3, $4, $5) \
             ), doomed AS ( \
                 SELECT id FROM run_log ORDER BY id DESC OFFSET $6 \
             ) \
             DELETE FROM run_log WHERE id IN (SELECT id FROM doomed)",
        )
        .bind(&entry.product)
        .bind(entry.variant_id)
        .bind(entry.price_before)
        .bind(entry.price_after)
        .bind(entry.status.as_str())
        .bind(self.log_cap - 1)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(())
    }

    async fn recent_log(&self, limit: i64) -> Result<Vec<RunLogEntry>, StoreError> {
        let rows = sqlx::query_as::<_, RunLogRow>(
            "SELECT id, product, variant_id, price_before, price_after, status, logged_at \
             FROM run_log \
             ORDER BY id DESC \
             LIMIT $1",
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        let mut entries = rows
            .into_iter()
            .map(log_entry_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::backend)?;
        entries.reverse();
        Ok(entries)
    }

    async fn clear_log(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM run_log")
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        Ok(result.rows_affected())
    }
}
