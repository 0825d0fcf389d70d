//! # ECIES Key Wrapping
//!
//! Wraps a group symmetric key for one recipient under that recipient's
//! public encryption key.
//!
//! ## Construction
//!
//! Ephemeral secp256k1 keypair -> ECDH with the recipient -> HKDF-SHA-256
//! -> AES-256-GCM. The ciphertext layout is:
//!
//! ```text
//! ephemeral_pub(65, uncompressed SEC1) || nonce(12) || ct || tag(16)
//! ```
//!
//! Exposed as pure functions over `(recipient, plaintext)` so the wrap can
//! be unit-tested without an identity store.

use crate::CryptoError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hkdf::hmac::SimpleHmac;
use hkdf::Hkdf;
use k256::ecdh::diffie_hellman;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use sha2::Sha256;

/// Uncompressed SEC1 point length.
const EPHEMERAL_LEN: usize = 65;
/// AES-GCM nonce length.
const NONCE_LEN: usize = 12;
/// AES-GCM authentication tag length.
const TAG_LEN: usize = 16;
/// Domain-separation info for the KDF.
const KDF_INFO: &[u8] = b"murmur-ecies-v1";

/// Minimum valid ciphertext length: ephemeral + nonce + tag (empty body).
pub const ECIES_MIN_CIPHERTEXT_LEN: usize = EPHEMERAL_LEN + NONCE_LEN + TAG_LEN;

/// A validated recipient public encryption key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EciesRecipient(PublicKey);

impl EciesRecipient {
    /// Parse from the hex-encoded SEC1 form carried in identity records.
    ///
    /// # Errors
    ///
    /// `MalformedEncryptKey` when the string is not hex or not a valid
    /// curve point.
    pub fn from_hex(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| CryptoError::MalformedEncryptKey(e.to_string()))?;
        let key = PublicKey::from_sec1_bytes(&bytes)
            .map_err(|e| CryptoError::MalformedEncryptKey(e.to_string()))?;
        Ok(Self(key))
    }

    /// Wrap an existing public key.
    #[must_use]
    pub fn from_public_key(key: PublicKey) -> Self {
        Self(key)
    }

    /// The hex-encoded compressed SEC1 form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_encoded_point(true).as_bytes())
    }
}

/// Derive the AEAD key from an ECDH shared secret.
fn derive_key(hk: &Hkdf<Sha256, SimpleHmac<Sha256>>) -> Result<[u8; 32], CryptoError> {
    let mut key = [0u8; 32];
    hk.expand(KDF_INFO, &mut key)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    Ok(key)
}

/// Encrypt `plaintext` for `recipient`.
///
/// A fresh ephemeral keypair is generated per call; two wraps of the same
/// plaintext never produce the same ciphertext.
///
/// # Errors
///
/// Returns `CryptoError::EncryptionFailed` if the AEAD rejects the input.
pub fn ecies_encrypt(
    recipient: &EciesRecipient,
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let ephemeral = SecretKey::random(&mut rand::thread_rng());
    let ephemeral_pub = ephemeral.public_key().to_encoded_point(false);

    let shared = diffie_hellman(ephemeral.to_nonzero_scalar(), recipient.0.as_affine());
    let key = derive_key(&shared.extract::<Sha256>(None))?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let mut nonce = [0u8; NONCE_LEN];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut nonce);

    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut out = Vec::with_capacity(EPHEMERAL_LEN + NONCE_LEN + sealed.len());
    out.extend_from_slice(ephemeral_pub.as_bytes());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Decrypt a wrapped key with the recipient's secret. Used by clients and
/// tests; the core itself only wraps.
///
/// # Errors
///
/// `CiphertextTooShort` on truncated input, `InvalidPublicKey` when the
/// ephemeral point does not parse, `DecryptionFailed` on AEAD failure.
pub fn ecies_decrypt(
    recipient_secret: &SecretKey,
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < ECIES_MIN_CIPHERTEXT_LEN {
        return Err(CryptoError::CiphertextTooShort {
            expected: ECIES_MIN_CIPHERTEXT_LEN,
            actual: ciphertext.len(),
        });
    }

    let ephemeral_pub = PublicKey::from_sec1_bytes(&ciphertext[..EPHEMERAL_LEN])
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let nonce = &ciphertext[EPHEMERAL_LEN..EPHEMERAL_LEN + NONCE_LEN];
    let sealed = &ciphertext[EPHEMERAL_LEN + NONCE_LEN..];

    let shared = diffie_hellman(
        recipient_secret.to_nonzero_scalar(),
        ephemeral_pub.as_affine(),
    );
    let key = derive_key(&shared.extract::<Sha256>(None))?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}
