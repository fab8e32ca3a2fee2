//! Bounded reconnection of the peer network handle
//!
//! State machine: `Healthy -> Degraded -> Reconnecting -> {Healthy, Exhausted}`.
//! Each blocking wait gets a fresh [`ReconnectAttempt`]; once it runs out the
//! controller stops trying for that wait and advances its round locally.

use std::sync::Arc;
use std::time::Duration;

use roundsync_net::discovery::DaemonLocator;
use roundsync_net::handle::SharedHandle;
use roundsync_net::health::{Health, PeerNetworkHealth};
use roundsync_net::traits::{Multiaddr, NetworkConnector};
use roundsync_runtime::SwarmRuntime;
use tracing::{info, warn};

/// Connection state of the supervised handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Last probe succeeded
    Healthy,
    /// Last probe failed, no rebuild attempted yet
    Degraded,
    /// A replacement handle is being built
    Reconnecting,
    /// All attempts of the current episode failed
    Exhausted,
}

/// Outcome of one supervision step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Probe succeeded
    Healthy,
    /// Probe failed and a new handle was swapped in
    Reconnected,
    /// Rebuild failed; waited `check_interval`, try again
    RetryLater,
    /// Rebuild failed `max` times
    Exhausted,
}

/// Reconnect bookkeeping for one degraded-connection episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectAttempt {
    /// Failed rebuilds so far
    pub count: u32,
    /// Failed rebuilds allowed
    pub max: u32,
    /// Wait between failed rebuilds
    pub backoff: Duration,
    /// Peers the original handle was seeded with
    pub initial_peers: Vec<Multiaddr>,
    /// Extra peers from configuration
    pub bootnodes: Vec<Multiaddr>,
}

impl ReconnectAttempt {
    /// Fresh episode with no failures yet
    pub fn new(
        max: u32,
        backoff: Duration,
        initial_peers: Vec<Multiaddr>,
        bootnodes: Vec<Multiaddr>,
    ) -> Self {
        Self {
            count: 0,
            max,
            backoff,
            initial_peers,
            bootnodes,
        }
    }

    /// True once `count` reached `max`
    pub fn is_exhausted(&self) -> bool {
        self.count >= self.max
    }
}

/// Restores a degraded peer network connection
pub struct ReconnectSupervisor<K, L> {
    connector: K,
    health: PeerNetworkHealth<L>,
    settle_delay: Duration,
    state: ConnectionState,
}

impl<K, L> ReconnectSupervisor<K, L>
where
    K: NetworkConnector,
    L: DaemonLocator,
{
    /// Supervise handles built by `connector`, waiting `settle_delay` before
    /// each swap
    pub fn new(connector: K, locator: L, settle_delay: Duration) -> Self {
        Self {
            connector,
            health: PeerNetworkHealth::new(locator),
            settle_delay,
            state: ConnectionState::Healthy,
        }
    }

    /// Current state of the supervised connection
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The connector used to build replacement handles
    pub fn connector(&self) -> &K {
        &self.connector
    }

    /// Probe the live handle and, if it is down, make one rebuild attempt.
    pub async fn ensure_connected<R: SwarmRuntime>(
        &mut self,
        handle: &SharedHandle<K::Network>,
        attempt: &mut ReconnectAttempt,
        runtime: &R,
    ) -> Recovery {
        let current = handle.load();
        let error = match self.health.probe(current.as_ref()).await {
            Health::Healthy => {
                attempt.count = 0;
                self.state = ConnectionState::Healthy;
                return Recovery::Healthy;
            }
            Health::Degraded(e) => e,
        };

        self.state = ConnectionState::Degraded;
        warn!(error = %error, "peer network connection lost");
        if attempt.is_exhausted() {
            self.state = ConnectionState::Exhausted;
            return Recovery::Exhausted;
        }

        self.state = ConnectionState::Reconnecting;
        let config = self
            .health
            .rebuild_config(&attempt.initial_peers, &attempt.bootnodes)
            .await;
        info!(
            attempt = attempt.count + 1,
            max = attempt.max,
            mode = ?config.mode(),
            "reconnecting peer network"
        );

        match self.health.rebuild(&self.connector, &config).await {
            Ok(network) => {
                runtime.sleep(self.settle_delay).await;
                handle.swap(Arc::new(network));
                attempt.count = 0;
                self.state = ConnectionState::Healthy;
                info!("peer network connection re-established");
                Recovery::Reconnected
            }
            Err(e) => {
                attempt.count += 1;
                warn!(attempt = attempt.count, error = %e, "reconnection attempt failed");
                if attempt.is_exhausted() {
                    self.state = ConnectionState::Exhausted;
                    warn!(max = attempt.max, "max reconnection attempts reached");
                    Recovery::Exhausted
                } else {
                    info!(retry_in_secs = attempt.backoff.as_secs_f64(), "retrying reconnection");
                    runtime.sleep(attempt.backoff).await;
                    self.state = ConnectionState::Degraded;
                    Recovery::RetryLater
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roundsync_net::discovery::NoDaemonLocator;
    use roundsync_net::{MockConnector, MockPeerNetwork};
    use roundsync_runtime::mock_runtime::MockRuntime;

    const CHECK: Duration = Duration::from_secs(5);
    const SETTLE: Duration = Duration::from_secs(5);

    struct FoundLocator;

    #[async_trait::async_trait]
    impl DaemonLocator for FoundLocator {
        async fn find_existing(&self) -> Option<Vec<Multiaddr>> {
            Some(vec![Multiaddr::tcp_any(4001), Multiaddr::quic_any(4002)])
        }
    }

    fn attempt() -> ReconnectAttempt {
        ReconnectAttempt::new(
            3,
            CHECK,
            vec![Multiaddr::new("/ip4/10.0.0.1/tcp/31337").unwrap()],
            vec![Multiaddr::new("/dns/boot.example/tcp/4001").unwrap()],
        )
    }

    fn dead_handle() -> SharedHandle<MockPeerNetwork> {
        let handle = SharedHandle::new(MockPeerNetwork::new("me"));
        handle.load().set_alive(false);
        handle
    }

    #[tokio::test]
    async fn healthy_probe_resets_count() {
        let rt = MockRuntime::new();
        let handle = SharedHandle::new(MockPeerNetwork::new("me"));
        let mut sup = ReconnectSupervisor::new(MockConnector::new("me"), NoDaemonLocator, SETTLE);
        let mut a = attempt();
        a.count = 2;

        assert_eq!(sup.ensure_connected(&handle, &mut a, &rt).await, Recovery::Healthy);
        assert_eq!(a.count, 0);
        assert_eq!(sup.state(), ConnectionState::Healthy);
        assert_eq!(sup.connector().attempts(), 0);
        assert!(rt.sleeps().is_empty());
    }

    #[tokio::test]
    async fn reconnect_swaps_in_new_handle_after_settle() {
        let rt = MockRuntime::new();
        let handle = dead_handle();
        let old = handle.load();
        let mut sup = ReconnectSupervisor::new(MockConnector::new("me"), NoDaemonLocator, SETTLE);
        let mut a = attempt();

        assert_eq!(sup.ensure_connected(&handle, &mut a, &rt).await, Recovery::Reconnected);
        assert!(!Arc::ptr_eq(&old, &handle.load()));
        assert_eq!(rt.sleeps(), vec![SETTLE]);
        assert_eq!(sup.state(), ConnectionState::Healthy);

        let configs = sup.connector().configs();
        let config = &configs[0];
        assert!(config.start);
        assert!(!config.client_mode);
        assert_eq!(config.host_addrs, vec![Multiaddr::tcp_any(0)]);
        assert_eq!(
            config.initial_peers,
            vec![
                Multiaddr::new("/ip4/10.0.0.1/tcp/31337").unwrap(),
                Multiaddr::new("/dns/boot.example/tcp/4001").unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn existing_daemon_means_client_mode() {
        let rt = MockRuntime::new();
        let handle = dead_handle();
        let mut sup = ReconnectSupervisor::new(MockConnector::new("me"), FoundLocator, SETTLE);
        let mut a = attempt();

        assert_eq!(sup.ensure_connected(&handle, &mut a, &rt).await, Recovery::Reconnected);
        let configs = sup.connector().configs();
        let config = &configs[0];
        assert!(!config.start);
        assert!(config.client_mode);
        assert_eq!(
            config.host_addrs,
            vec![Multiaddr::tcp_any(4001), Multiaddr::quic_any(4002)]
        );
        assert_eq!(handle.load().listen_addrs(), config.host_addrs.as_slice());
    }

    #[tokio::test]
    async fn three_failures_exhaust() {
        let rt = MockRuntime::new();
        let handle = dead_handle();
        let mut sup = ReconnectSupervisor::new(
            MockConnector::new("me").always_failing(),
            NoDaemonLocator,
            SETTLE,
        );
        let mut a = attempt();

        assert_eq!(sup.ensure_connected(&handle, &mut a, &rt).await, Recovery::RetryLater);
        assert_eq!(sup.ensure_connected(&handle, &mut a, &rt).await, Recovery::RetryLater);
        assert_eq!(sup.ensure_connected(&handle, &mut a, &rt).await, Recovery::Exhausted);
        assert_eq!(a.count, 3);
        assert_eq!(sup.state(), ConnectionState::Exhausted);
        assert_eq!(sup.connector().attempts(), 3);
        // No growth between attempts, and no wait after the last one.
        assert_eq!(rt.sleeps(), vec![CHECK, CHECK]);
    }

    #[tokio::test]
    async fn success_after_failures_resets_count() {
        let rt = MockRuntime::new();
        let handle = dead_handle();
        let mut sup = ReconnectSupervisor::new(
            MockConnector::new("me").failing_first(2),
            NoDaemonLocator,
            SETTLE,
        );
        let mut a = attempt();

        assert_eq!(sup.ensure_connected(&handle, &mut a, &rt).await, Recovery::RetryLater);
        assert_eq!(sup.ensure_connected(&handle, &mut a, &rt).await, Recovery::RetryLater);
        assert_eq!(sup.ensure_connected(&handle, &mut a, &rt).await, Recovery::Reconnected);
        assert_eq!(a.count, 0);
        assert_eq!(sup.ensure_connected(&handle, &mut a, &rt).await, Recovery::Healthy);
    }
}
