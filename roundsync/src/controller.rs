//! Round synchronization controller
//!
//! [`RoundSyncController`] ties the pieces together for one participant:
//!
//! - [`RoundSyncController::agent_block`] waits until the coordinator reports
//!   a round this node has not played yet, keeping the peer network alive
//!   along the way.
//! - [`RoundSyncController::on_rewards_updated`] folds new rewards into the
//!   batched signal and submits when the period has elapsed.
//! - [`RoundSyncController::on_round_advanced`] steps the local round after
//!   the game finished one, retries a missed submission and then blocks.
//!
//! Nothing in here aborts the process. Transport loss ends in a local round
//! advance, coordinator outages are retried until `train_timeout`, and
//! submission failures are retried at the next hook.

use std::time::Duration;

use roundsync_core::rewards::{my_signal, total_rewards_by_agent, RewardLedger, SignalByAgent};
use roundsync_core::round::{Backoff, RoundState, RoundTransition};
use roundsync_core::submission::SignalAccumulator;
use roundsync_core::traits::PeerId;
use roundsync_net::discovery::DaemonLocator;
use roundsync_net::handle::SharedHandle;
use roundsync_net::traits::{NetworkConnector, PeerNetwork};
use roundsync_runtime::SwarmRuntime;
use tracing::{debug, info};

use crate::config::SyncConfig;
use crate::coordinator::Coordinator;
use crate::error::SyncError;
use crate::poller::RoundPoller;
use crate::reconnect::{ReconnectAttempt, ReconnectSupervisor, Recovery};
use crate::submit::SubmissionGate;

/// How a blocking wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// The coordinator reached or passed the local round; the node joined it
    Joined(u64),
    /// The coordinator is on the last round of the run
    FinalRound(u64),
    /// The peer network could not be restored; the round was advanced locally
    ReconnectExhausted(u64),
    /// `train_timeout` elapsed without a usable round
    TimedOut,
}

/// Drives one participant through the swarm's rounds
pub struct RoundSyncController<C, K, L, R>
where
    K: NetworkConnector,
{
    config: SyncConfig,
    state: RoundState,
    handle: SharedHandle<K::Network>,
    supervisor: ReconnectSupervisor<K, L>,
    poller: RoundPoller,
    gate: SubmissionGate,
    coordinator: C,
    runtime: R,
}

impl<C, K, L, R> RoundSyncController<C, K, L, R>
where
    C: Coordinator,
    K: NetworkConnector,
    L: DaemonLocator,
    R: SwarmRuntime,
{
    /// Register with the coordinator and start at its current round.
    ///
    /// Unlike everything after it, a failure here is returned to the caller.
    pub async fn connect(
        config: SyncConfig,
        coordinator: C,
        handle: SharedHandle<K::Network>,
        connector: K,
        locator: L,
        runtime: R,
    ) -> Result<Self, SyncError> {
        config.validate()?;

        let peer_id = handle.load().local_peer_id();
        coordinator.register_peer(&peer_id).await?;
        let (round, stage) = coordinator.round_and_stage().await?;

        let mut state = RoundState::new(peer_id, round, config.max_round)?;
        state.stage = stage;

        let now = runtime.now();
        let accumulator = SignalAccumulator::new(now, config.submit_period_hours)?;
        let poller = RoundPoller::new(config.check_interval(), config.log_timeout(), now);
        let supervisor = ReconnectSupervisor::new(connector, locator, config.reconnect_settle());

        info!(
            peer = %state.peer_id,
            round,
            stage,
            max_round = config.max_round,
            "registered with coordinator"
        );

        Ok(Self {
            config,
            state,
            handle,
            supervisor,
            poller,
            gate: SubmissionGate::new(accumulator),
            coordinator,
            runtime,
        })
    }

    /// Block until the swarm moves to a round this node should play.
    pub async fn agent_block(&mut self) -> BlockOutcome {
        let started = self.runtime.now();
        let timeout_ms = duration_ms(self.config.train_timeout());

        self.poller.reset(started);
        let mut backoff = match Backoff::new(
            self.config.check_interval(),
            self.config.max_check_interval(),
        ) {
            Ok(backoff) => backoff,
            // Rejected by `validate` during `connect`.
            Err(_) => return BlockOutcome::TimedOut,
        };
        let mut attempt = ReconnectAttempt::new(
            self.config.max_reconnect_attempts,
            self.config.check_interval(),
            self.handle.load().initial_peers(),
            self.config.bootnodes.clone(),
        );

        while self.runtime.now().saturating_sub(started) < timeout_ms {
            match self
                .supervisor
                .ensure_connected(&self.handle, &mut attempt, &self.runtime)
                .await
            {
                Recovery::Healthy | Recovery::Reconnected => {}
                Recovery::RetryLater => continue,
                Recovery::Exhausted => {
                    let round = self.state.advance_locally();
                    info!(round, "continuing without peer network");
                    return BlockOutcome::ReconnectExhausted(round);
                }
            }

            let Some((remote_round, stage)) =
                self.poller.fetch(&self.coordinator, &self.runtime).await
            else {
                continue;
            };

            match self.state.observe(remote_round) {
                RoundTransition::Joined(round) => {
                    self.state.stage = stage;
                    backoff.reset();
                    info!(round, stage, "joining round");
                    return BlockOutcome::Joined(round);
                }
                RoundTransition::FinalRound(round) => {
                    info!(round, "swarm is on its final round");
                    return BlockOutcome::FinalRound(round);
                }
                RoundTransition::Behind(round) => {
                    let delay = backoff.next_delay();
                    info!(
                        round,
                        local_round = self.state.round,
                        next_check_secs = delay.as_secs_f64(),
                        "already finished round"
                    );
                    self.runtime.sleep(delay).await;
                }
            }
        }

        info!(round = self.state.round, "training timed out");
        BlockOutcome::TimedOut
    }

    /// Fold the latest rewards into the batched signal and submit if due.
    ///
    /// Returns whether a submission went through.
    pub async fn on_rewards_updated(&mut self, ledger: &RewardLedger, current_stage: u64) -> bool {
        let signal_by_agent = total_rewards_by_agent(ledger, current_stage);
        let signal = my_signal(&signal_by_agent, &self.state.peer_id);
        self.gate.accumulator_mut().accumulate(signal);
        debug!(
            signal,
            batched = self.gate.accumulator().batched_signal(),
            agents = signal_by_agent.len(),
            "rewards updated"
        );
        self.try_submit(&signal_by_agent).await
    }

    /// The local game finished its round: step to the next one, retry a
    /// missed submission, then wait for the swarm.
    ///
    /// The signal is not accumulated again here.
    pub async fn on_round_advanced(&mut self, ledger: &RewardLedger, current_stage: u64) -> BlockOutcome {
        let round = self.state.advance_locally();
        self.state.stage = 0;
        debug!(round, "local round advanced");

        if !self.gate.accumulator().submitted_this_round() {
            let signal_by_agent = total_rewards_by_agent(ledger, current_stage);
            self.try_submit(&signal_by_agent).await;
        }
        self.gate.accumulator_mut().start_new_round();
        self.agent_block().await
    }

    async fn try_submit(&mut self, signal_by_agent: &SignalByAgent) -> bool {
        let now = self.runtime.now();
        self.gate
            .maybe_submit(
                now,
                signal_by_agent,
                self.state.round,
                &self.state.peer_id,
                &self.coordinator,
            )
            .await
    }

    /// Local round state
    pub fn round_state(&self) -> &RoundState {
        &self.state
    }

    /// Local participant id
    pub fn peer_id(&self) -> &PeerId {
        &self.state.peer_id
    }

    /// Slot holding the live peer network handle
    pub fn handle(&self) -> &SharedHandle<K::Network> {
        &self.handle
    }

    /// Submission gate and its accumulator
    pub fn gate(&self) -> &SubmissionGate {
        &self.gate
    }

    /// Reconnect supervisor owning the connector
    pub fn supervisor(&self) -> &ReconnectSupervisor<K, L> {
        &self.supervisor
    }

    /// Coordinator this node reports to
    pub fn coordinator(&self) -> &C {
        &self.coordinator
    }

    /// Clock and sleep provider
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Validated configuration
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
