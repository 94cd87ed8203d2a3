//! Global attempt-start rate limiter
//!
//! Hands out start slots spaced `1 / rate` seconds apart across all workers.
//! A slot is reserved under the lock and waited for outside it.

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter for `per_second` attempt starts per second
    pub fn new(per_second: f64) -> Self {
        let interval = Duration::try_from_secs_f64(1.0 / per_second).unwrap_or(Duration::ZERO);
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Reserve the next start slot, unless it would fall past `deadline`
    async fn reserve(&self, deadline: Option<Instant>) -> Option<Instant> {
        let now = Instant::now();
        let mut next = self.next_slot.lock().await;
        let slot = match *next {
            Some(slot) if slot > now => slot,
            _ => now,
        };
        if deadline.is_some_and(|deadline| slot >= deadline) {
            return None;
        }
        *next = Some(slot + self.interval);
        Some(slot)
    }

    /// Wait for a start slot
    ///
    /// Returns `false` if cancelled first or if the next free slot lies at or
    /// past `deadline`. A refused slot is not consumed.
    pub async fn acquire(&self, cancel: &CancellationToken, deadline: Option<Instant>) -> bool {
        let Some(slot) = self.reserve(deadline).await else {
            return false;
        };
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep_until(slot) => true,
        }
    }
}
