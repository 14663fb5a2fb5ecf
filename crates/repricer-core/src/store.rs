//! Storage port for the job record and run log.
//!
//! The engine only ever talks to [`JobStore`]; the server wires in the
//! Postgres implementation, tests use [`InMemoryJobStore`]. There is a
//! single job slot — `save_job` overwrites, `delete_job` cancels.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::job::{NewLogEntry, PriceJob, RunLogEntry};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job store backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl StoreError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        StoreError::Backend(Box::new(err))
    }
}

/// Durable home of the single job record and the capped run log.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn load_job(&self) -> Result<Option<PriceJob>, StoreError>;

    /// Overwrite the job slot with `job`.
    async fn save_job(&self, job: &PriceJob) -> Result<(), StoreError>;

    /// Remove the job record. Returns whether one existed. This is the
    /// only cancellation mechanism.
    async fn delete_job(&self) -> Result<bool, StoreError>;

    /// Append one log line, dropping the oldest lines past the store's
    /// capacity.
    async fn append_log(&self, entry: NewLogEntry) -> Result<(), StoreError>;

    /// The newest `limit` lines in chronological order.
    async fn recent_log(&self, limit: i64) -> Result<Vec<RunLogEntry>, StoreError>;

    /// Drop all log lines, returning how many were removed.
    async fn clear_log(&self) -> Result<u64, StoreError>;
}

/// Mutex-guarded store used by the engine test suite and anywhere a
/// durable backend is overkill.
pub struct InMemoryJobStore {
    log_cap: usize,
    state: Mutex<MemState>,
}

struct MemState {
    job: Option<PriceJob>,
    log: VecDeque<RunLogEntry>,
    next_log_id: i64,
}

impl InMemoryJobStore {
    #[must_use]
    pub fn new(log_cap: usize) -> Self {
        InMemoryJobStore {
            log_cap: log_cap.max(1),
            state: Mutex::new(MemState {
                job: None,
                log: VecDeque::new(),
                next_log_id: 1,
            }),
        }
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        InMemoryJobStore::new(2000)
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn load_job(&self) -> Result<Option<PriceJob>, StoreError> {
        Ok(self.state.lock().await.job.clone())
    }

    async fn save_job(&self, job: &PriceJob) -> Result<(), StoreError> {
        self.state.lock().await.job = Some(job.clone());
        Ok(())
    }

    async fn delete_job(&self) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.job.take().is_some())
    }

    async fn append_log(&self, entry: NewLogEntry) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let id = state.next_log_id;
        state.next_log_id += 1;
        state.log.push_back(RunLogEntry {
            id,
            product: entry.product,
            variant_id: entry.variant_id,
            price_before: entry.price_before,
            price_after: entry.price_after,
            status: entry.status,
            logged_at: Utc::now(),
        });
        while state.log.len() > self.log_cap {
            state.log.pop_front();
        }
        Ok(())
    }

    async fn recent_log(&self, limit: i64) -> Result<Vec<RunLogEntry>, StoreError> {
        let state = self.state.lock().await;
        let limit = usize::try_from(limit.max(0)).unwrap_or(0);
        let skip = state.log.len().saturating_sub(limit);
        Ok(state.log.iter().skip(skip).cloned().collect())
    }

    async fn clear_log(&self) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let removed = state.log.len() as u64;
        state.log.clear();
        Ok(removed)
    }
}
