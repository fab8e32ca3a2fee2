//! # RoundSync
//!
//! **Round synchronization and reward submission for swarm participants.**
//!
//! A participant in a multi-agent training swarm plays rounds that a shared
//! coordinator announces. Between rounds it has to wait for the swarm to move
//! on, keep its peer network connection alive, and periodically report its
//! accumulated reward signal together with a vote for the round's best agent.
//! This crate is that control loop.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use roundsync::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), SyncError> {
//!     let config = SyncConfig::builder().max_round(100).build()?;
//!     let handle = SharedHandle::new(MockPeerNetwork::new("QmLocal"));
//!     let mut controller = RoundSyncController::connect(
//!         config,
//!         LocalCoordinator::new(0, 0),
//!         handle,
//!         MockConnector::new("QmLocal"),
//!         SocketStatLocator::default(),
//!         TokioRuntime::new(),
//!     )
//!     .await?;
//!
//!     loop {
//!         // play the round, then:
//!         let ledger = RewardLedger::new();
//!         controller.on_rewards_updated(&ledger, 1).await;
//!         if let BlockOutcome::FinalRound(_) = controller.on_round_advanced(&ledger, 1).await {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `tokio-runtime` (default): Tokio runtime and the `roundsync_sim` binary
//!
//! ## Crate Structure
//!
//! - [`roundsync_core`]: Round state, reward aggregation, signal accumulator
//! - [`roundsync_net`]: Peer network traits, health probe, daemon discovery
//! - [`roundsync_runtime`]: Clock and sleep abstraction (Tokio / mock)

#![forbid(unsafe_code)]

// Re-export sub-crates
pub use roundsync_core as core;
pub use roundsync_net as net;
pub use roundsync_runtime as runtime;

pub use roundsync_core::{
    rewards::{my_signal, select_winner, total_rewards_by_agent, RewardLedger, SignalByAgent},
    round::{Backoff, RoundState, RoundTransition},
    submission::SignalAccumulator,
    traits::PeerId,
};

pub mod config;
pub mod controller;
pub mod coordinator;
pub mod error;
pub mod poller;
pub mod reconnect;
pub mod submit;

pub use config::{SyncConfig, SyncConfigBuilder};
pub use controller::{BlockOutcome, RoundSyncController};
pub use coordinator::{Coordinator, CoordinatorError, LocalCoordinator};
pub use error::{ConfigError, SyncError};
pub use poller::RoundPoller;
pub use reconnect::{ConnectionState, ReconnectAttempt, ReconnectSupervisor, Recovery};
pub use submit::SubmissionGate;

/// Prelude module for convenient imports
///
/// ```rust,ignore
/// use roundsync::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::prelude::*;
    pub use crate::net::prelude::*;
    pub use crate::net::{MockConnector, MockPeerNetwork};
    pub use crate::runtime::mock_runtime::MockRuntime;
    #[cfg(feature = "tokio-runtime")]
    pub use crate::runtime::tokio_runtime::TokioRuntime;
    pub use crate::runtime::SwarmRuntime;

    pub use crate::{
        BlockOutcome, Coordinator, CoordinatorError, LocalCoordinator, RoundSyncController,
        SyncConfig, SyncError,
    };
}
