//! # RoundSync Network
//!
//! Peer network abstractions for RoundSync.
//!
//! The overlay transport itself lives outside this workspace. This crate
//! provides:
//! - `PeerNetwork` / `NetworkConnector` traits describing a live handle and
//!   how to build one
//! - `SharedHandle`, the swappable slot the controller reads the live
//!   handle from
//! - `PeerNetworkHealth` for liveness probing and alternate-address discovery
//! - `SocketStatLocator`, best-effort detection of an already running
//!   peer-network daemon
//! - Mock network and connector for testing

pub mod discovery;
pub mod handle;
pub mod health;
pub mod traits;

mod mock;
pub use mock::{MockConnector, MockPeerNetwork};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::discovery::*;
    pub use crate::handle::*;
    pub use crate::health::*;
    pub use crate::traits::*;
}

/// Result type for network operations
pub type Result<T> = core::result::Result<T, Error>;

/// Network error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The daemon behind the handle stopped answering
    #[error("peer network unreachable: {0}")]
    Unreachable(String),
    /// Building a new handle failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// A multiaddress did not start with '/'
    #[error("invalid multiaddress: {0:?}")]
    InvalidAddress(String),
}
