//! Time-gated reward and winner submission
//!
//! Nothing is sent until the submission period has elapsed since the last
//! complete submission. Coordinator write failures never escape this module:
//! the node simply tries again at the next eligible moment.

use roundsync_core::rewards::{select_winner, SignalByAgent};
use roundsync_core::submission::SignalAccumulator;
use roundsync_core::traits::PeerId;
use tracing::{debug, info};

use crate::coordinator::{Coordinator, CoordinatorError};

/// Reward channel used for every submission
pub const REWARD_CHANNEL: u64 = 0;

/// Decides when to push the accumulated signal to the coordinator
#[derive(Debug, Clone)]
pub struct SubmissionGate {
    accumulator: SignalAccumulator,
}

impl SubmissionGate {
    /// Gate over an accumulator whose clock starts at its last submit time
    pub fn new(accumulator: SignalAccumulator) -> Self {
        Self { accumulator }
    }

    /// Batched signal and submission bookkeeping
    pub fn accumulator(&self) -> &SignalAccumulator {
        &self.accumulator
    }

    /// Mutable access, used to fold in new signal and to start a round
    pub fn accumulator_mut(&mut self) -> &mut SignalAccumulator {
        &mut self.accumulator
    }

    /// Submit reward and winner vote if the period has elapsed.
    ///
    /// Returns `true` only when both submissions went through.
    pub async fn maybe_submit<C: Coordinator + ?Sized>(
        &mut self,
        now_ms: u64,
        signal_by_agent: &SignalByAgent,
        round: u64,
        self_id: &PeerId,
        coordinator: &C,
    ) -> bool {
        if !self.accumulator.is_due(now_ms) {
            return false;
        }
        match self
            .submit(now_ms, signal_by_agent, round, self_id, coordinator)
            .await
        {
            Ok(winner) => {
                info!(round, winner = %winner, "submitted reward and winner vote");
                true
            }
            Err(e) => {
                debug!(round, error = %e, "submission failed, will retry at next opportunity");
                false
            }
        }
    }

    async fn submit<C: Coordinator + ?Sized>(
        &mut self,
        now_ms: u64,
        signal_by_agent: &SignalByAgent,
        round: u64,
        self_id: &PeerId,
        coordinator: &C,
    ) -> Result<PeerId, CoordinatorError> {
        let amount = self.accumulator.submission_amount();
        coordinator
            .submit_reward(round, REWARD_CHANNEL, amount, self_id)
            .await?;
        self.accumulator.clear_batch();

        // With no signals at all we vote for ourselves.
        let winner = select_winner(signal_by_agent).unwrap_or(self_id).clone();
        coordinator
            .submit_winners(round, std::slice::from_ref(&winner), self_id)
            .await?;

        self.accumulator.mark_submitted(now_ms);
        Ok(winner)
    }
}
