//! Peer network traits and types
//!
//! This module defines the opaque peer-network handle the controller talks
//! to and the configuration used to (re)build one.

use roundsync_core::traits::PeerId;

use crate::{Error, Result};

/// Multiaddress-style listen or peer address, e.g. `/ip4/0.0.0.0/tcp/4001`
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Multiaddr(String);

impl Multiaddr {
    /// Parse an address; only the leading `/` is checked
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        if !addr.starts_with('/') || addr.len() < 2 {
            return Err(Error::InvalidAddress(addr));
        }
        Ok(Self(addr))
    }

    /// TCP listen address on all interfaces
    pub fn tcp_any(port: u16) -> Self {
        Self(format!("/ip4/0.0.0.0/tcp/{port}"))
    }

    /// QUIC (UDP) listen address on all interfaces
    pub fn quic_any(port: u16) -> Self {
        Self(format!("/ip4/0.0.0.0/udp/{port}/quic"))
    }

    /// Borrow as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Multiaddr {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Multiaddr> for String {
    fn from(addr: Multiaddr) -> Self {
        addr.0
    }
}

impl core::fmt::Display for Multiaddr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::str::FromStr for Multiaddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// How a new handle attaches to the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
    /// Start our own daemon and listen (host mode)
    Host,
    /// Attach to a daemon that is already running (client mode)
    Client,
}

/// Parameters for building a peer network handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Whether the handle starts its own daemon
    pub start: bool,
    /// Addresses to listen on (host mode) or attach to (client mode)
    pub host_addrs: Vec<Multiaddr>,
    /// Peers to dial on startup
    pub initial_peers: Vec<Multiaddr>,
    /// Run without accepting inbound connections
    pub client_mode: bool,
}

impl NetworkConfig {
    /// Host mode on an ephemeral TCP port
    pub fn host(initial_peers: Vec<Multiaddr>) -> Self {
        Self {
            start: true,
            host_addrs: vec![Multiaddr::tcp_any(0)],
            initial_peers,
            client_mode: false,
        }
    }

    /// Client mode against the addresses of an existing daemon
    pub fn client(existing: Vec<Multiaddr>, initial_peers: Vec<Multiaddr>) -> Self {
        Self {
            start: false,
            host_addrs: existing,
            initial_peers,
            client_mode: true,
        }
    }

    /// Connection mode this configuration describes
    pub fn mode(&self) -> ConnectMode {
        if self.client_mode {
            ConnectMode::Client
        } else {
            ConnectMode::Host
        }
    }
}

/// A live handle into the peer overlay
#[async_trait::async_trait]
pub trait PeerNetwork: Send + Sync {
    /// Addresses other peers can reach us on. Fails when the transport is down.
    async fn visible_addresses(&self, latest: bool) -> Result<Vec<Multiaddr>>;

    /// Identity of the local peer
    fn local_peer_id(&self) -> PeerId;

    /// Peers this handle was seeded with
    fn initial_peers(&self) -> Vec<Multiaddr>;
}

/// Builds new peer network handles
#[async_trait::async_trait]
pub trait NetworkConnector: Send + Sync {
    /// Handle type produced by this connector
    type Network: PeerNetwork;

    /// Build and start a handle from `config`
    async fn connect(&self, config: &NetworkConfig) -> Result<Self::Network>;
}
