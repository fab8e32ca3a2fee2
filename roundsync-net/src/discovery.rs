//! Discovery of an already running peer-network daemon
//!
//! When the live handle dies the daemon process is sometimes still up. If
//! its TCP and UDP listeners can be found, reconnecting in client mode
//! against them is cheaper than starting a fresh daemon. This is purely an
//! optimization: every locator may return `None` and reconnection still
//! works in host mode.

use tokio::process::Command;
use tracing::debug;

use crate::traits::Multiaddr;

/// Default daemon process name
pub const DEFAULT_DAEMON_PROCESS: &str = "p2pd";

/// Finds listen addresses of a running daemon.
///
/// Called from inside the reconnect loop, so implementations must not block
/// the executor.
#[async_trait::async_trait]
pub trait DaemonLocator: Send + Sync {
    /// `[tcp, quic]` listen addresses if both listeners were found
    async fn find_existing(&self) -> Option<Vec<Multiaddr>>;
}

/// Locator that never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDaemonLocator;

#[async_trait::async_trait]
impl DaemonLocator for NoDaemonLocator {
    async fn find_existing(&self) -> Option<Vec<Multiaddr>> {
        None
    }
}

/// Locator backed by `ss -tulpn` (Linux socket statistics)
#[derive(Debug, Clone)]
pub struct SocketStatLocator {
    process_name: String,
}

impl SocketStatLocator {
    /// Look for listeners owned by `process_name`
    pub fn new(process_name: impl Into<String>) -> Self {
        Self {
            process_name: process_name.into(),
        }
    }
}

impl Default for SocketStatLocator {
    fn default() -> Self {
        Self::new(DEFAULT_DAEMON_PROCESS)
    }
}

#[async_trait::async_trait]
impl DaemonLocator for SocketStatLocator {
    async fn find_existing(&self) -> Option<Vec<Multiaddr>> {
        let output = match Command::new("ss").arg("-tulpn").kill_on_drop(true).output().await {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                debug!(status = %output.status, "ss exited unsuccessfully");
                return None;
            }
            Err(e) => {
                debug!(error = %e, "socket listing unavailable");
                return None;
            }
        };
        let table = String::from_utf8_lossy(&output.stdout);
        parse_daemon_listeners(&table, &self.process_name)
    }
}

/// Extract the daemon's listen addresses from `ss -tulpn` output.
///
/// Returns `[/ip4/0.0.0.0/tcp/<port>, /ip4/0.0.0.0/udp/<port>/quic]` using the
/// first TCP and first UDP listener owned by `process_name`, or `None` unless
/// both are present.
pub fn parse_daemon_listeners(table: &str, process_name: &str) -> Option<Vec<Multiaddr>> {
    let owner = format!("((\"{process_name}\",");
    let mut tcp = None;
    let mut udp = None;

    for line in table.lines() {
        if !line.contains(&owner) {
            continue;
        }
        let mut fields = line.split_whitespace();
        let netid = fields.next();
        // State, Recv-Q, Send-Q, then the local address.
        let port = fields.nth(3).and_then(local_port);
        match (netid, port) {
            (Some("tcp"), Some(port)) if tcp.is_none() => tcp = Some(port),
            (Some("udp"), Some(port)) if udp.is_none() => udp = Some(port),
            _ => {}
        }
    }

    match (tcp, udp) {
        (Some(tcp), Some(udp)) => Some(vec![Multiaddr::tcp_any(tcp), Multiaddr::quic_any(udp)]),
        _ => None,
    }
}

fn local_port(local_addr: &str) -> Option<u16> {
    local_addr.rsplit(':').next()?.parse().ok()
}
