//! Signal accumulation and the submission time gate
//!
//! Signals are batched locally and pushed to the coordinator at most once per
//! submission period. Timestamps are milliseconds on the runtime clock.

use crate::{Error, Result};

/// Default gap between two submissions, in hours
pub const DEFAULT_SUBMIT_PERIOD_HOURS: f64 = 3.0;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Locally batched signal awaiting submission
#[derive(Debug, Clone, PartialEq)]
pub struct SignalAccumulator {
    batched_signal: f64,
    last_submit_ms: u64,
    submit_period_hours: f64,
    submitted_this_round: bool,
}

impl SignalAccumulator {
    /// Start accumulating at `now_ms`; the first submission becomes due one
    /// full period later.
    pub fn new(now_ms: u64, submit_period_hours: f64) -> Result<Self> {
        if !(submit_period_hours.is_finite() && submit_period_hours > 0.0) {
            return Err(Error::InvalidSubmitPeriod(submit_period_hours));
        }
        Ok(Self {
            batched_signal: 0.0,
            last_submit_ms: now_ms,
            submit_period_hours,
            submitted_this_round: false,
        })
    }

    /// Add a signal to the batch
    pub fn accumulate(&mut self, signal: f64) {
        self.batched_signal += signal;
    }

    /// Signal batched since the last successful reward submission
    pub fn batched_signal(&self) -> f64 {
        self.batched_signal
    }

    /// Hours since the last successful submission
    pub fn elapsed_hours(&self, now_ms: u64) -> f64 {
        now_ms.saturating_sub(self.last_submit_ms) as f64 / MILLIS_PER_HOUR
    }

    /// A submission is due once strictly more than one period has elapsed
    pub fn is_due(&self, now_ms: u64) -> bool {
        self.elapsed_hours(now_ms) > self.submit_period_hours
    }

    /// Amount to submit: the batched signal floored to an integer
    pub fn submission_amount(&self) -> i64 {
        floor_to_i64(self.batched_signal)
    }

    /// Clear the batch after the reward submission went through
    pub fn clear_batch(&mut self) {
        self.batched_signal = 0.0;
    }

    /// Record a complete submission (reward and winners) at `now_ms`
    pub fn mark_submitted(&mut self, now_ms: u64) {
        self.last_submit_ms = now_ms;
        self.submitted_this_round = true;
    }

    /// Whether a complete submission happened during the current round
    pub fn submitted_this_round(&self) -> bool {
        self.submitted_this_round
    }

    /// Forget the per-round submission flag before the next round
    pub fn start_new_round(&mut self) {
        self.submitted_this_round = false;
    }

    /// Timestamp of the last complete submission
    pub fn last_submit_ms(&self) -> u64 {
        self.last_submit_ms
    }
}

// `f64::floor` needs std.
fn floor_to_i64(value: f64) -> i64 {
    let truncated = value as i64;
    if (truncated as f64) > value {
        truncated - 1
    } else {
        truncated
    }
}
