//! Fixed-interval pacing for Admin API calls.
//!
//! The engine makes up to three remote calls per variant; the Admin API
//! budgets requests per second. A [`Throttle`] is created per tick and
//! awaited before every call, keeping the pacing policy out of the
//! iteration logic.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Spaces calls at least `interval` apart. The first call goes through
/// immediately; a zero interval disables pacing entirely.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Throttle {
            interval,
            last: None,
        }
    }

    #[must_use]
    pub fn from_millis(interval_ms: u64) -> Self {
        Throttle::new(Duration::from_millis(interval_ms))
    }

    /// Wait until the interval since the previous call has elapsed.
    pub async fn ready(&mut self) {
        if self.interval.is_zero() {
            return;
        }
        if let Some(last) = self.last {
            sleep_until(last + self.interval).await;
        }
        self.last = Some(Instant::now());
    }
}
