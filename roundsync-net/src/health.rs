//! Peer network health
//!
//! Thin wrapper over the live handle exposing the three operations
//! reconnection needs: a liveness probe, discovery of an existing daemon's
//! listen addresses and building a replacement handle. It holds no round or
//! reward state.

use tracing::{debug, info};

use crate::discovery::DaemonLocator;
use crate::traits::{Multiaddr, NetworkConfig, NetworkConnector, PeerNetwork};
use crate::{Error, Result};

/// Result of a liveness probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    /// The handle answered
    Healthy,
    /// The handle failed; carries the transport error
    Degraded(Error),
}

/// Health operations over a peer network
pub struct PeerNetworkHealth<L> {
    locator: L,
}

impl<L: DaemonLocator> PeerNetworkHealth<L> {
    /// Use `locator` for daemon discovery
    pub fn new(locator: L) -> Self {
        Self { locator }
    }

    /// Liveness probe: ask the handle for its latest visible addresses
    pub async fn probe<N: PeerNetwork + ?Sized>(&self, network: &N) -> Health {
        match network.visible_addresses(true).await {
            Ok(addrs) => {
                debug!(visible = addrs.len(), "peer network alive");
                Health::Healthy
            }
            Err(e) => Health::Degraded(e),
        }
    }

    /// Listen addresses of an already running daemon, if one can be found
    pub async fn discover_existing(&self) -> Option<Vec<Multiaddr>> {
        self.locator.find_existing().await
    }

    /// Replacement handle configuration: client mode against an existing
    /// daemon when one is found, host mode on an ephemeral port otherwise.
    pub async fn rebuild_config(
        &self,
        initial_peers: &[Multiaddr],
        bootnodes: &[Multiaddr],
    ) -> NetworkConfig {
        let peers: Vec<Multiaddr> = initial_peers.iter().chain(bootnodes).cloned().collect();
        match self.discover_existing().await {
            Some(existing) => {
                info!(addrs = ?existing, "found existing peer network daemon, attaching as client");
                NetworkConfig::client(existing, peers)
            }
            None => {
                info!("no existing peer network daemon found, starting a new one");
                NetworkConfig::host(peers)
            }
        }
    }

    /// Build a replacement handle with `connector`
    pub async fn rebuild<K: NetworkConnector>(
        &self,
        connector: &K,
        config: &NetworkConfig,
    ) -> Result<K::Network> {
        connector.connect(config).await
    }
}
