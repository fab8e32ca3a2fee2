//! Local round state and the wait-for-round backoff
//!
//! The coordinator owns the canonical round number. A participant keeps a
//! local copy that only ever moves forward: either by joining a round the
//! coordinator reports, or by a single optimistic step when the transport
//! cannot be recovered.

use core::time::Duration;

use crate::traits::PeerId;
use crate::{Error, Result};

/// Local view of the swarm's round and stage
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RoundState {
    /// Current round (never decreases)
    pub round: u64,
    /// Current stage within the round
    pub stage: u64,
    /// Number of rounds in the run
    pub max_round: u64,
    /// Local participant
    pub peer_id: PeerId,
}

/// What happened when a coordinator-reported round was offered to the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundTransition {
    /// Remote round is at or past the local round; local state moved to it
    Joined(u64),
    /// Remote round is the last one of the run
    FinalRound(u64),
    /// Remote round is behind the local round; keep waiting
    Behind(u64),
}

impl RoundState {
    /// Create a round state starting at `round`, stage 0
    pub fn new(peer_id: PeerId, round: u64, max_round: u64) -> Result<Self> {
        if max_round == 0 {
            return Err(Error::InvalidMaxRound);
        }
        Ok(Self {
            round,
            stage: 0,
            max_round,
            peer_id,
        })
    }

    /// Round index of the last round in the run
    pub fn final_round(&self) -> u64 {
        self.max_round - 1
    }

    /// Offer a coordinator-reported round.
    ///
    /// Joining takes precedence over the final-round shortcut so a node that
    /// is behind still records the final round as its own.
    pub fn observe(&mut self, remote_round: u64) -> RoundTransition {
        if remote_round >= self.round {
            self.round = remote_round;
            RoundTransition::Joined(remote_round)
        } else if remote_round == self.final_round() {
            RoundTransition::FinalRound(remote_round)
        } else {
            RoundTransition::Behind(remote_round)
        }
    }

    /// Step one round ahead without coordinator confirmation
    pub fn advance_locally(&mut self) -> u64 {
        self.round = self.round.saturating_add(1);
        self.round
    }
}

/// Exponential backoff used while waiting for the coordinator to advance.
///
/// Each call to [`Backoff::next_delay`] returns the current delay and then
/// doubles it, saturating at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    current: Duration,
    max: Duration,
}

impl Backoff {
    /// Create a backoff starting at `initial`, capped at `max`
    pub fn new(initial: Duration, max: Duration) -> Result<Self> {
        if initial.is_zero() || initial > max {
            return Err(Error::InvalidBackoff);
        }
        Ok(Self {
            initial,
            current: initial,
            max,
        })
    }

    /// Delay to use now
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Return the delay to sleep now and grow the next one
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Back to the initial interval
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
