//! # RoundSync Runtime
//!
//! Clock and sleep abstraction for the RoundSync controller.
//!
//! Every wait in the controller goes through [`SwarmRuntime`], so the same
//! loop runs on Tokio in production and on a virtual clock in tests.
//!
//! ## Feature Flags
//!
//! - `tokio` (default): Tokio-backed runtime

use core::future::Future;
use core::time::Duration;

/// Runtime trait for time and sleeping
pub trait SwarmRuntime: Send + Sync + 'static {
    /// Current time in milliseconds. Never goes backwards.
    fn now(&self) -> u64;

    /// Sleep for the specified duration
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

#[cfg(feature = "tokio")]
pub mod tokio_runtime {
    //! Tokio-based runtime implementation

    use super::*;
    use std::time::{Instant, SystemTime, UNIX_EPOCH};

    /// Tokio runtime wrapper.
    ///
    /// `now()` is anchored to the Unix epoch when the runtime is created and
    /// advanced with a monotonic clock afterwards, so wall-clock jumps do not
    /// shorten or stretch the controller's timeouts.
    #[derive(Debug, Clone)]
    pub struct TokioRuntime {
        epoch_ms: u64,
        origin: Instant,
    }

    impl TokioRuntime {
        /// Create a new Tokio runtime wrapper
        pub fn new() -> Self {
            let epoch_ms = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64;
            Self {
                epoch_ms,
                origin: Instant::now(),
            }
        }
    }

    impl Default for TokioRuntime {
        fn default() -> Self {
            Self::new()
        }
    }

    impl SwarmRuntime for TokioRuntime {
        fn now(&self) -> u64 {
            self.epoch_ms + self.origin.elapsed().as_millis() as u64
        }

        async fn sleep(&self, duration: Duration) {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Mock runtime for testing
pub mod mock_runtime {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// Virtual-clock runtime.
    ///
    /// `sleep` returns immediately but advances the clock by the requested
    /// duration and records it, so tests can assert on the exact waits a
    /// loop performed.
    #[derive(Debug, Default)]
    pub struct MockRuntime {
        current_time_ms: AtomicU64,
        sleeps: Mutex<Vec<Duration>>,
    }

    impl MockRuntime {
        /// Create a new mock runtime at time zero
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a mock runtime starting at `start_ms`
        pub fn starting_at(start_ms: u64) -> Self {
            Self {
                current_time_ms: AtomicU64::new(start_ms),
                sleeps: Mutex::new(Vec::new()),
            }
        }

        /// Advance the mock clock without recording a sleep
        pub fn advance(&self, duration: Duration) {
            self.current_time_ms
                .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
        }

        /// Every sleep requested so far, in order
        pub fn sleeps(&self) -> Vec<Duration> {
            self.sleeps
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone()
        }

        /// Sum of all recorded sleeps
        pub fn total_slept(&self) -> Duration {
            self.sleeps().iter().sum()
        }

        /// Drop the recorded sleeps (the clock keeps its value)
        pub fn clear_sleeps(&self) {
            self.sleeps
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clear();
        }
    }

    impl SwarmRuntime for MockRuntime {
        fn now(&self) -> u64 {
            self.current_time_ms.load(Ordering::SeqCst)
        }

        async fn sleep(&self, duration: Duration) {
            self.sleeps
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(duration);
            self.advance(duration);
        }
    }
}

/// Get the default runtime based on features
#[cfg(feature = "tokio")]
pub fn default_runtime() -> tokio_runtime::TokioRuntime {
    tokio_runtime::TokioRuntime::new()
}
