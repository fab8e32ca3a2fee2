//! Coordinator contract and an in-memory coordinator
//!
//! The coordinator is the single source of truth for the current round and
//! stage, and the sink for reward and winner submissions. The controller
//! only ever talks to it through [`Coordinator`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use roundsync_core::traits::PeerId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

/// Coordinator failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinatorError {
    /// Transient: the coordinator could not be reached or is not ready
    #[error("coordinator unavailable: {0}")]
    Unavailable(String),
    /// The coordinator refused the request
    #[error("coordinator rejected request: {0}")]
    Rejected(String),
}

/// External coordinator / ledger
#[async_trait::async_trait]
pub trait Coordinator: Send + Sync {
    /// Announce this peer to the swarm
    async fn register_peer(&self, peer: &PeerId) -> Result<(), CoordinatorError>;

    /// Canonical `(round, stage)`
    async fn round_and_stage(&self) -> Result<(u64, u64), CoordinatorError>;

    /// Submit the batched reward for `round` on `channel`
    async fn submit_reward(
        &self,
        round: u64,
        channel: u64,
        amount: i64,
        peer: &PeerId,
    ) -> Result<(), CoordinatorError>;

    /// Vote for the round's winners
    async fn submit_winners(
        &self,
        round: u64,
        winners: &[PeerId],
        peer: &PeerId,
    ) -> Result<(), CoordinatorError>;
}

#[async_trait::async_trait]
impl<T: Coordinator + ?Sized> Coordinator for Arc<T> {
    async fn register_peer(&self, peer: &PeerId) -> Result<(), CoordinatorError> {
        (**self).register_peer(peer).await
    }

    async fn round_and_stage(&self) -> Result<(u64, u64), CoordinatorError> {
        (**self).round_and_stage().await
    }

    async fn submit_reward(
        &self,
        round: u64,
        channel: u64,
        amount: i64,
        peer: &PeerId,
    ) -> Result<(), CoordinatorError> {
        (**self).submit_reward(round, channel, amount, peer).await
    }

    async fn submit_winners(
        &self,
        round: u64,
        winners: &[PeerId],
        peer: &PeerId,
    ) -> Result<(), CoordinatorError> {
        (**self).submit_winners(round, winners, peer).await
    }
}

/// A reward submission recorded by [`LocalCoordinator`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSubmission {
    pub round: u64,
    pub channel: u64,
    pub amount: i64,
    pub peer: PeerId,
}

/// A winner vote recorded by [`LocalCoordinator`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerSubmission {
    pub round: u64,
    pub winners: Vec<PeerId>,
    pub peer: PeerId,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PeerRegistry {
    #[serde(default)]
    peers: Vec<PeerId>,
}

#[derive(Debug, Default)]
struct LedgerState {
    round: u64,
    stage: u64,
    registry: PeerRegistry,
    rewards: Vec<RewardSubmission>,
    winners: Vec<WinnerSubmission>,
    read_failures: u32,
    write_failures: u32,
}

/// In-memory coordinator for simulations and tests.
///
/// Registration is idempotent and keeps first-registration order. Reads and
/// writes can be scripted to fail to exercise the controller's recovery
/// paths. With a peer file attached, every new registration is written
/// through to it.
#[derive(Debug, Default)]
pub struct LocalCoordinator {
    state: Mutex<LedgerState>,
    peer_file: Option<PathBuf>,
}

impl LocalCoordinator {
    /// Coordinator positioned at `(round, stage)`
    pub fn new(round: u64, stage: u64) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                round,
                stage,
                ..LedgerState::default()
            }),
            peer_file: None,
        }
    }

    /// Write each new registration through to `path`.
    ///
    /// The file is a JSON object shared with other writers: only its
    /// `peers` array is touched, other keys are kept.
    pub fn with_peer_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.peer_file = Some(path.into());
        self
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Move to `(round, stage)`
    pub fn set_round(&self, round: u64, stage: u64) {
        let mut state = self.lock();
        state.round = round;
        state.stage = stage;
    }

    /// Next round, stage 0. Returns the new round.
    pub fn advance_round(&self) -> u64 {
        let mut state = self.lock();
        state.round += 1;
        state.stage = 0;
        state.round
    }

    /// Next stage of the current round. Returns the new stage.
    pub fn advance_stage(&self) -> u64 {
        let mut state = self.lock();
        state.stage += 1;
        state.stage
    }

    /// Fail the next `n` round reads with `Unavailable`
    pub fn fail_next_reads(&self, n: u32) {
        self.lock().read_failures = n;
    }

    /// Fail the next `n` submissions with `Unavailable`
    pub fn fail_next_writes(&self, n: u32) {
        self.lock().write_failures = n;
    }

    /// Registered peers in registration order
    pub fn registered_peers(&self) -> Vec<PeerId> {
        self.lock().registry.peers.clone()
    }

    /// Reward submissions received so far
    pub fn reward_submissions(&self) -> Vec<RewardSubmission> {
        self.lock().rewards.clone()
    }

    /// Winner submissions received so far
    pub fn winner_submissions(&self) -> Vec<WinnerSubmission> {
        self.lock().winners.clone()
    }

    /// Merge the registered peers into the `peers` array of the JSON object
    /// at `path`, creating the file if needed. Other keys are kept.
    pub fn save_peers(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let peers = self.registered_peers();
        merge_peers_into_file(path.as_ref(), &peers)
    }

    /// Merge peers from a file written by [`LocalCoordinator::save_peers`].
    /// Returns how many new peers were added.
    pub fn load_peers(&self, path: impl AsRef<Path>) -> io::Result<usize> {
        let raw = fs::read_to_string(path)?;
        let saved: PeerRegistry = serde_json::from_str(&raw)?;
        let mut state = self.lock();
        let before = state.registry.peers.len();
        for peer in saved.peers {
            if !state.registry.peers.contains(&peer) {
                state.registry.peers.push(peer);
            }
        }
        Ok(state.registry.peers.len() - before)
    }

    fn take_write_failure(state: &mut LedgerState) -> Result<(), CoordinatorError> {
        if state.write_failures > 0 {
            state.write_failures -= 1;
            return Err(CoordinatorError::Unavailable("scripted write failure".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Coordinator for LocalCoordinator {
    async fn register_peer(&self, peer: &PeerId) -> Result<(), CoordinatorError> {
        let mut state = self.lock();
        if !state.registry.peers.contains(peer) {
            if let Some(path) = &self.peer_file {
                merge_peers_into_file(path, std::slice::from_ref(peer)).map_err(|e| {
                    CoordinatorError::Unavailable(format!("peer file {}: {e}", path.display()))
                })?;
            }
            info!(peer = %peer, "registered peer");
            state.registry.peers.push(peer.clone());
        }
        Ok(())
    }

    async fn round_and_stage(&self) -> Result<(u64, u64), CoordinatorError> {
        let mut state = self.lock();
        if state.read_failures > 0 {
            state.read_failures -= 1;
            return Err(CoordinatorError::Unavailable("scripted read failure".into()));
        }
        Ok((state.round, state.stage))
    }

    async fn submit_reward(
        &self,
        round: u64,
        channel: u64,
        amount: i64,
        peer: &PeerId,
    ) -> Result<(), CoordinatorError> {
        let mut state = self.lock();
        Self::take_write_failure(&mut state)?;
        state.rewards.push(RewardSubmission {
            round,
            channel,
            amount,
            peer: peer.clone(),
        });
        Ok(())
    }

    async fn submit_winners(
        &self,
        round: u64,
        winners: &[PeerId],
        peer: &PeerId,
    ) -> Result<(), CoordinatorError> {
        let mut state = self.lock();
        Self::take_write_failure(&mut state)?;
        state.winners.push(WinnerSubmission {
            round,
            winners: winners.to_vec(),
            peer: peer.clone(),
        });
        Ok(())
    }
}

fn merge_peers_into_file(path: &Path, peers: &[PeerId]) -> io::Result<()> {
    let mut doc: Map<String, Value> = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Map::new(),
        Err(e) => return Err(e),
    };
    let mut listed = match doc.remove("peers") {
        Some(Value::Array(listed)) => listed,
        _ => Vec::new(),
    };
    for peer in peers {
        let entry = Value::String(peer.as_str().to_owned());
        if !listed.contains(&entry) {
            listed.push(entry);
        }
    }
    doc.insert("peers".to_owned(), Value::Array(listed));
    fs::write(path, serde_json::to_string_pretty(&doc)?)
}
