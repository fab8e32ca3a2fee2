//! # RoundSync Core
//!
//! Core data model and pure algorithms for a swarm participant.
//!
//! This crate is `no_std` compatible (an allocator is required) and provides:
//! - Peer identities derived from Ed25519 keys
//! - Local round state and the "waiting for round" backoff schedule
//! - Reward aggregation over the nested reward ledger
//! - Signal accumulation and the time-windowed submission gate
//!
//! Nothing in this crate performs I/O; the `roundsync` crate drives these
//! types against a coordinator and a peer network.
//!
//! ## Feature Flags
//!
//! - `std` (default): Enable standard library support

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod identity;
pub mod rewards;
pub mod round;
pub mod submission;
pub mod traits;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::rewards::*;
    pub use crate::round::*;
    pub use crate::submission::*;
    pub use crate::traits::*;
}

/// Result type for RoundSync core operations
pub type Result<T> = core::result::Result<T, Error>;

/// Error type for RoundSync core operations
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Peer identifier was empty
    EmptyPeerId,
    /// Round limit must be at least one
    InvalidMaxRound,
    /// Backoff interval was zero or exceeded its cap
    InvalidBackoff,
    /// Submission period must be positive and finite
    InvalidSubmitPeriod(f64),
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::EmptyPeerId => write!(f, "peer id must not be empty"),
            Error::InvalidMaxRound => write!(f, "max round must be at least 1"),
            Error::InvalidBackoff => {
                write!(f, "backoff interval must be non-zero and not exceed its cap")
            }
            Error::InvalidSubmitPeriod(hours) => {
                write!(f, "submit period must be positive, got {hours} hours")
            }
        }
    }
}
