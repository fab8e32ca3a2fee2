//! Error types for the controller crate.

use std::path::PathBuf;

use crate::coordinator::CoordinatorError;

/// Invalid controller configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A duration setting was zero, negative or not finite
    #[error("{field} must be a positive number of seconds, got {value}")]
    NonPositiveInterval { field: &'static str, value: f64 },
    /// A duration setting too large to represent as a `Duration`
    #[error("{field} is out of range, got {value}")]
    IntervalOutOfRange { field: &'static str, value: f64 },
    /// The backoff cap is below the base check interval
    #[error("max_check_interval_secs ({max}) must be >= check_interval_secs ({base})")]
    BackoffCapBelowInterval { base: f64, max: f64 },
    /// Round limit of zero
    #[error("max_round must be at least 1")]
    ZeroMaxRound,
    /// No reconnect attempt allowed
    #[error("max_reconnect_attempts must be at least 1")]
    ZeroReconnectAttempts,
    /// Submission period must be positive
    #[error("submit_period_hours must be positive, got {0}")]
    NonPositiveSubmitPeriod(f64),
}

/// Top-level error for controller setup
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),
    #[error("peer network error: {0}")]
    Network(#[from] roundsync_net::Error),
    #[error(transparent)]
    Core(#[from] roundsync_core::Error),
}
