//! Controller configuration
//!
//! Every timing knob of the round-sync loop, with the production defaults.
//! Durations are stored as seconds so configuration files stay readable.

use std::fs;
use std::path::Path;
use std::time::Duration;

use roundsync_core::submission::DEFAULT_SUBMIT_PERIOD_HOURS;
use roundsync_net::discovery::DEFAULT_DAEMON_PROCESS;
use roundsync_net::traits::Multiaddr;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SyncError};

/// Configuration for a [`crate::RoundSyncController`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base polling interval, also the wait between reconnect attempts
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: f64,
    /// Minimum gap between two "coordinator unreachable" warnings
    #[serde(default = "default_log_timeout")]
    pub log_timeout_secs: f64,
    /// Cap for the wait-for-round backoff
    #[serde(default = "default_max_check_interval")]
    pub max_check_interval_secs: f64,
    /// Upper bound on one blocking wait for the next round
    #[serde(default = "default_train_timeout")]
    pub train_timeout_secs: f64,
    /// Minimum hours between two submissions
    #[serde(default = "default_submit_period")]
    pub submit_period_hours: f64,
    /// Reconnect attempts before falling back to a local round advance
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Wait after building a new handle before it is swapped in
    #[serde(default = "default_reconnect_settle")]
    pub reconnect_settle_secs: f64,
    /// Number of rounds in the run
    #[serde(default = "default_max_round")]
    pub max_round: u64,
    /// Extra peers used when rebuilding the network handle
    #[serde(default)]
    pub bootnodes: Vec<Multiaddr>,
    /// Process name of the peer network daemon
    #[serde(default = "default_daemon_process")]
    pub daemon_process: String,
}

fn default_check_interval() -> f64 {
    5.0
}
fn default_log_timeout() -> f64 {
    10.0
}
fn default_max_check_interval() -> f64 {
    60.0 * 15.0
}
fn default_train_timeout() -> f64 {
    60.0 * 60.0 * 24.0 * 31.0
}
fn default_submit_period() -> f64 {
    DEFAULT_SUBMIT_PERIOD_HOURS
}
fn default_max_reconnect_attempts() -> u32 {
    3
}
fn default_reconnect_settle() -> f64 {
    5.0
}
fn default_max_round() -> u64 {
    1_000_000
}
fn default_daemon_process() -> String {
    DEFAULT_DAEMON_PROCESS.to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            log_timeout_secs: default_log_timeout(),
            max_check_interval_secs: default_max_check_interval(),
            train_timeout_secs: default_train_timeout(),
            submit_period_hours: default_submit_period(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_settle_secs: default_reconnect_settle(),
            max_round: default_max_round(),
            bootnodes: Vec::new(),
            daemon_process: default_daemon_process(),
        }
    }
}

impl SyncConfig {
    /// Create a new builder
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::new()
    }

    /// Load and validate a JSON configuration file. Missing fields take
    /// their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| SyncError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| SyncError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the controller cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("check_interval_secs", self.check_interval_secs),
            ("log_timeout_secs", self.log_timeout_secs),
            ("max_check_interval_secs", self.max_check_interval_secs),
            ("train_timeout_secs", self.train_timeout_secs),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositiveInterval { field, value });
            }
            check_range(field, value)?;
        }
        if !(self.reconnect_settle_secs.is_finite() && self.reconnect_settle_secs >= 0.0) {
            return Err(ConfigError::NonPositiveInterval {
                field: "reconnect_settle_secs",
                value: self.reconnect_settle_secs,
            });
        }
        check_range("reconnect_settle_secs", self.reconnect_settle_secs)?;
        if self.max_check_interval_secs < self.check_interval_secs {
            return Err(ConfigError::BackoffCapBelowInterval {
                base: self.check_interval_secs,
                max: self.max_check_interval_secs,
            });
        }
        if !(self.submit_period_hours.is_finite() && self.submit_period_hours > 0.0) {
            return Err(ConfigError::NonPositiveSubmitPeriod(self.submit_period_hours));
        }
        if self.max_round == 0 {
            return Err(ConfigError::ZeroMaxRound);
        }
        if self.max_reconnect_attempts == 0 {
            return Err(ConfigError::ZeroReconnectAttempts);
        }
        Ok(())
    }

    /// Base polling interval
    pub fn check_interval(&self) -> Duration {
        secs_to_duration(self.check_interval_secs)
    }

    /// Debounce window for poll-failure warnings
    pub fn log_timeout(&self) -> Duration {
        secs_to_duration(self.log_timeout_secs)
    }

    /// Cap of the wait-for-round backoff
    pub fn max_check_interval(&self) -> Duration {
        secs_to_duration(self.max_check_interval_secs)
    }

    /// Bound on one blocking wait
    pub fn train_timeout(&self) -> Duration {
        secs_to_duration(self.train_timeout_secs)
    }

    /// Wait before a rebuilt handle is swapped in
    pub fn reconnect_settle(&self) -> Duration {
        secs_to_duration(self.reconnect_settle_secs)
    }
}

fn check_range(field: &'static str, value: f64) -> Result<(), ConfigError> {
    match Duration::try_from_secs_f64(value) {
        Ok(_) => Ok(()),
        Err(_) => Err(ConfigError::IntervalOutOfRange { field, value }),
    }
}

// Unvalidated fields saturate instead of panicking.
fn secs_to_duration(secs: f64) -> Duration {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) => duration,
        Err(_) if secs > 0.0 => Duration::MAX,
        Err(_) => Duration::ZERO,
    }
}

/// Builder for SyncConfig
#[derive(Debug, Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base polling interval
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.config.check_interval_secs = interval.as_secs_f64();
        self
    }

    /// Set the debounce window for poll-failure warnings
    pub fn log_timeout(mut self, timeout: Duration) -> Self {
        self.config.log_timeout_secs = timeout.as_secs_f64();
        self
    }

    /// Set the cap of the wait-for-round backoff
    pub fn max_check_interval(mut self, interval: Duration) -> Self {
        self.config.max_check_interval_secs = interval.as_secs_f64();
        self
    }

    /// Set the bound on one blocking wait
    pub fn train_timeout(mut self, timeout: Duration) -> Self {
        self.config.train_timeout_secs = timeout.as_secs_f64();
        self
    }

    /// Set the minimum hours between submissions
    pub fn submit_period_hours(mut self, hours: f64) -> Self {
        self.config.submit_period_hours = hours;
        self
    }

    /// Set the number of reconnect attempts per blocking wait
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    /// Set the settle delay after building a new handle
    pub fn reconnect_settle(mut self, delay: Duration) -> Self {
        self.config.reconnect_settle_secs = delay.as_secs_f64();
        self
    }

    /// Set the number of rounds in the run
    pub fn max_round(mut self, rounds: u64) -> Self {
        self.config.max_round = rounds;
        self
    }

    /// Set the bootnodes used on reconnect
    pub fn bootnodes(mut self, bootnodes: Vec<Multiaddr>) -> Self {
        self.config.bootnodes = bootnodes;
        self
    }

    /// Set the daemon process name used for discovery
    pub fn daemon_process(mut self, name: impl Into<String>) -> Self {
        self.config.daemon_process = name.into();
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<SyncConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
