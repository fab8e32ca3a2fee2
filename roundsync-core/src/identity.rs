//! Node identity
//!
//! A participant's peer id is derived from its Ed25519 verifying key, so the
//! same seed always yields the same identity across restarts.

use ed25519_dalek::SigningKey;

use crate::traits::PeerId;

/// Node identity containing the signing key and derived peer id
#[derive(Clone)]
pub struct NodeIdentity {
    /// Unique node ID (derived from public key)
    pub id: PeerId,
    secret: SigningKey,
}

impl NodeIdentity {
    /// Build an identity from a 32-byte seed
    ///
    /// The caller must ensure the seed is cryptographically random
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let secret = SigningKey::from_bytes(&seed);
        let id = PeerId::from_public_key(&secret.verifying_key().to_bytes());
        Self { id, secret }
    }

    /// Public key bytes
    pub fn public_key(&self) -> [u8; 32] {
        self.secret.verifying_key().to_bytes()
    }

    /// Peer id derived from the public key
    pub fn peer_id(&self) -> &PeerId {
        &self.id
    }
}

impl core::fmt::Debug for NodeIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NodeIdentity").field("id", &self.id).finish_non_exhaustive()
    }
}
