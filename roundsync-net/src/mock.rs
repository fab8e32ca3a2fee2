//! Mock network for testing
//!
//! This module provides an in-memory peer network and connector for unit
//! and integration testing without a real daemon.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use roundsync_core::traits::PeerId;

use crate::traits::{Multiaddr, NetworkConfig, NetworkConnector, PeerNetwork};
use crate::{Error, Result};

/// Mock peer network handle whose liveness can be toggled
#[derive(Debug)]
pub struct MockPeerNetwork {
    peer_id: PeerId,
    alive: AtomicBool,
    initial_peers: Vec<Multiaddr>,
    listen: Vec<Multiaddr>,
}

impl MockPeerNetwork {
    /// Create a live mock handle for `peer_id`
    ///
    /// # Panics
    /// Panics if `peer_id` is empty.
    pub fn new(peer_id: &str) -> Self {
        Self::from_config(mock_peer_id(peer_id), &NetworkConfig::host(Vec::new()))
    }

    fn from_config(peer_id: PeerId, config: &NetworkConfig) -> Self {
        Self {
            peer_id,
            alive: AtomicBool::new(true),
            initial_peers: config.initial_peers.clone(),
            listen: config.host_addrs.clone(),
        }
    }

    /// Seed the handle with initial peers
    pub fn with_initial_peers(mut self, peers: Vec<Multiaddr>) -> Self {
        self.initial_peers = peers;
        self
    }

    /// Simulate the daemon dying or coming back
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Addresses the handle was built to listen on
    pub fn listen_addrs(&self) -> &[Multiaddr] {
        &self.listen
    }
}

#[async_trait::async_trait]
impl PeerNetwork for MockPeerNetwork {
    async fn visible_addresses(&self, _latest: bool) -> Result<Vec<Multiaddr>> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(self.listen.clone())
        } else {
            Err(Error::Unreachable("mock daemon stopped".into()))
        }
    }

    fn local_peer_id(&self) -> PeerId {
        self.peer_id.clone()
    }

    fn initial_peers(&self) -> Vec<Multiaddr> {
        self.initial_peers.clone()
    }
}

/// Mock connector that can be told to fail a number of times
#[derive(Debug)]
pub struct MockConnector {
    peer_id: PeerId,
    failures_left: AtomicU32,
    always_fail: bool,
    attempts: AtomicU32,
    configs: Mutex<Vec<NetworkConfig>>,
}

impl MockConnector {
    /// Connector producing live handles for `peer_id`
    ///
    /// # Panics
    /// Panics if `peer_id` is empty.
    pub fn new(peer_id: &str) -> Self {
        Self {
            peer_id: mock_peer_id(peer_id),
            failures_left: AtomicU32::new(0),
            always_fail: false,
            attempts: AtomicU32::new(0),
            configs: Mutex::new(Vec::new()),
        }
    }

    /// Fail the first `n` connection attempts
    pub fn failing_first(self, n: u32) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    /// Fail every connection attempt
    pub fn always_failing(mut self) -> Self {
        self.always_fail = true;
        self
    }

    /// Number of `connect` calls so far
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Configurations passed to `connect`, in order
    pub fn configs(&self) -> Vec<NetworkConfig> {
        self.configs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait::async_trait]
impl NetworkConnector for MockConnector {
    type Network = MockPeerNetwork;

    async fn connect(&self, config: &NetworkConfig) -> Result<MockPeerNetwork> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.configs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(config.clone());

        let scripted_failure = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if self.always_fail || scripted_failure {
            return Err(Error::ConnectionFailed("mock connector refused".into()));
        }
        Ok(MockPeerNetwork::from_config(self.peer_id.clone(), config))
    }
}

fn mock_peer_id(id: &str) -> PeerId {
    match PeerId::new(id) {
        Ok(id) => id,
        Err(e) => panic!("mock peer id: {e}"),
    }
}
