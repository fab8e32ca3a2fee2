//! Swappable handle slot
//!
//! The controller and anything else that talks to the overlay read the live
//! handle from a [`SharedHandle`]. Reconnection builds a complete new handle
//! first and only then swaps the `Arc`, so readers see either the old handle
//! or the new one, never a partially built connection.

use std::sync::{Arc, RwLock};

/// Single-writer, multi-reader slot holding the live network handle
#[derive(Debug)]
pub struct SharedHandle<N> {
    slot: Arc<RwLock<Arc<N>>>,
}

impl<N> Clone for SharedHandle<N> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<N> SharedHandle<N> {
    /// Wrap an initial handle
    pub fn new(network: N) -> Self {
        Self::from_arc(Arc::new(network))
    }

    /// Wrap an already shared handle
    pub fn from_arc(network: Arc<N>) -> Self {
        Self {
            slot: Arc::new(RwLock::new(network)),
        }
    }

    /// Current handle. Callers keep using the returned `Arc` even if a swap
    /// happens meanwhile.
    pub fn load(&self) -> Arc<N> {
        let guard = self.slot.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Install `network` and return the handle it replaced
    pub fn swap(&self, network: Arc<N>) -> Arc<N> {
        let mut guard = self.slot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *guard, network)
    }
}
