//! # Shared Crypto - Feeds Core Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `ecies` | secp256k1 ECDH + HKDF-SHA-256 + AES-256-GCM | Group key wrapping |
//! | `group_key` | 256-bit CSPRNG keys | Symmetric group keys |
//! | `signing` | secp256k1 | Transaction envelope signatures |
//!
//! ## Security Properties
//!
//! - **ECIES**: fresh ephemeral keypair per wrap; AEAD-authenticated
//! - **Envelope signing**: RFC 6979 deterministic
//! - **Group keys**: zeroized on drop

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecies;
pub mod errors;
pub mod group_key;
pub mod signing;

// Re-exports
pub use ecies::{ecies_decrypt, ecies_encrypt, EciesRecipient, ECIES_MIN_CIPHERTEXT_LEN};
pub use errors::CryptoError;
pub use group_key::{GroupKey, GROUP_KEY_LEN};
pub use signing::{verify_envelope, EnvelopeSignature, SigningIdentity};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
