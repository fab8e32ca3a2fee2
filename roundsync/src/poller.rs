//! Coordinator round polling
//!
//! A failed read is retried after a fixed `check_interval`, forever (the
//! enclosing wait is bounded by its own timeout). Warnings are debounced so a
//! flapping coordinator produces at most one line per `log_timeout`.

use std::time::Duration;

use roundsync_runtime::SwarmRuntime;
use tracing::warn;

use crate::coordinator::Coordinator;

/// Polls the coordinator for `(round, stage)`
#[derive(Debug, Clone)]
pub struct RoundPoller {
    check_interval: Duration,
    log_timeout: Duration,
    last_logged_ms: u64,
}

impl RoundPoller {
    /// Create a poller; the debounce clock starts at `now_ms`
    pub fn new(check_interval: Duration, log_timeout: Duration, now_ms: u64) -> Self {
        Self {
            check_interval,
            log_timeout,
            last_logged_ms: now_ms,
        }
    }

    /// Restart the debounce clock (start of a new blocking wait)
    pub fn reset(&mut self, now_ms: u64) {
        self.last_logged_ms = now_ms;
    }

    /// One read. On failure logs (debounced), sleeps `check_interval` and
    /// returns `None` so the caller loops.
    pub async fn fetch<C, R>(&mut self, coordinator: &C, runtime: &R) -> Option<(u64, u64)>
    where
        C: Coordinator + ?Sized,
        R: SwarmRuntime,
    {
        let attempted_at = runtime.now();
        match coordinator.round_and_stage().await {
            Ok(round_and_stage) => Some(round_and_stage),
            Err(e) => {
                let since_log = attempted_at.saturating_sub(self.last_logged_ms);
                if since_log > self.log_timeout.as_millis() as u64 {
                    warn!(
                        error = %e,
                        retry_in_secs = self.check_interval.as_secs_f64(),
                        "could not fetch round and stage"
                    );
                    self.last_logged_ms = attempted_at;
                }
                runtime.sleep(self.check_interval).await;
                None
            }
        }
    }

    /// Timestamp of the last emitted warning
    pub fn last_logged_ms(&self) -> u64 {
        self.last_logged_ms
    }
}
