//! # Group Symmetric Keys
//!
//! The 256-bit symmetric key shared by a group's active members for one
//! key generation. The core generates and wraps these keys; it never uses
//! them to encrypt message bodies (clients do).

use zeroize::Zeroize;

/// Group key length in bytes.
pub const GROUP_KEY_LEN: usize = 32;

/// A 256-bit group symmetric key. Zeroized on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct GroupKey([u8; GROUP_KEY_LEN]);

impl GroupKey {
    /// Generate a fresh key from the process CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; GROUP_KEY_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; GROUP_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Get inner bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; GROUP_KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.write_str("GroupKey(..)")
    }
}
