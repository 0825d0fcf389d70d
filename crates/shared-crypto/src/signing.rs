//! # Envelope Signing
//!
//! Every state-changing operation travels as a signed transaction whose
//! `signatory` is an address string: the hex of a compressed secp256k1
//! point. A [`SigningIdentity`] is the private half of such an address;
//! it produces the 64-byte `r || s` signatures the envelope carries and
//! the node's countersignature on validated transactions.
//!
//! The core never verifies envelope signatures itself (the chain layer
//! does, before a transaction becomes canonical); [`verify_envelope`]
//! exists so tests and tooling can check a signature against the address
//! string directly, without reconstructing any key object.

use crate::CryptoError;
use k256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use zeroize::Zeroize;

/// The 64-byte `r || s` signature format of the transaction envelope.
pub type EnvelopeSignature = [u8; 64];

/// A signing identity: the private key behind one address string.
///
/// Signing is RFC 6979 deterministic, so countersigning the same payload
/// twice yields the same bytes and replays stay byte-identical.
pub struct SigningIdentity {
    key: SigningKey,
}

impl SigningIdentity {
    /// Generate a fresh identity.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            key: SigningKey::random(&mut rand::thread_rng()),
        }
    }

    /// Load an identity from its hex-encoded secret scalar, as a node
    /// key arrives from deployment configuration.
    pub fn from_secret_hex(encoded: &str) -> Result<Self, CryptoError> {
        let mut raw = hex::decode(encoded.trim()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        let key = SigningKey::from_slice(&raw).map_err(|_| CryptoError::InvalidPrivateKey)?;
        raw.zeroize();
        Ok(Self { key })
    }

    /// The address string other participants see: hex of the compressed
    /// public point. This is the `signatory` field of every envelope this
    /// identity signs.
    #[must_use]
    pub fn address(&self) -> String {
        hex::encode(self.key.verifying_key().to_sec1_bytes())
    }

    /// Sign serialized payload bytes for an envelope.
    #[must_use]
    pub fn sign_envelope(&self, payload: &[u8]) -> EnvelopeSignature {
        let signature: Signature = self.key.sign(payload);
        signature.to_bytes().into()
    }
}

/// Check an envelope signature against the signatory address string.
///
/// # Errors
///
/// `InvalidPublicKey` when the address is not a hex-encoded curve point,
/// `InvalidSignature` when the 64 bytes do not parse as `r || s`, and
/// `SignatureVerificationFailed` when the signature does not match.
pub fn verify_envelope(
    signatory: &str,
    payload: &[u8],
    signature: &EnvelopeSignature,
) -> Result<(), CryptoError> {
    let raw = hex::decode(signatory.trim()).map_err(|_| CryptoError::InvalidPublicKey)?;
    let key = VerifyingKey::from_sec1_bytes(&raw).map_err(|_| CryptoError::InvalidPublicKey)?;
    let signature =
        Signature::from_slice(signature).map_err(|_| CryptoError::InvalidSignature)?;
    key.verify(payload, &signature)
        .map_err(|_| CryptoError::SignatureVerificationFailed)
}
