//! secp256k1 Diffie-Hellman key agreement and content-key wrapping.
//!
//! Every envelope generates one ephemeral keypair. The shared secret
//! with each recipient's static key derives a per-recipient wrapping
//! key (SHA-256 of the shared x-coordinate), under which the random
//! content key is sealed with AES-256-GCM. The recipient recomputes
//! the same shared secret from the ephemeral public key carried in
//! the envelope.

use depinchat_types::{DepinError, Result};
use k256::ecdh::EphemeralSecret;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::aead::{self, NONCE_LEN};
use crate::hash::sha256;

// ---------------------------------------------------------------------------
// WrapKey
// ---------------------------------------------------------------------------

/// Symmetric key wrapping the envelope content key for one recipient.
///
/// Zeroized on drop. No `Clone`/`Debug` to prevent leakage.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct WrapKey([u8; 32]);

impl WrapKey {
    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Parses a SEC1 public key (compressed or uncompressed bytes).
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey> {
    PublicKey::from_sec1_bytes(bytes).map_err(|_| DepinError::Crypto {
        reason: "invalid secp256k1 public key".into(),
    })
}

// ---------------------------------------------------------------------------
// Ephemeral side (sender)
// ---------------------------------------------------------------------------

/// Sender-side ephemeral keypair, one per envelope.
pub struct EnvelopeEphemeral {
    secret: EphemeralSecret,
}

impl EnvelopeEphemeral {
    /// Generates a fresh ephemeral keypair from OS entropy.
    pub fn generate() -> Self {
        Self {
            secret: EphemeralSecret::random(&mut OsRng),
        }
    }

    /// Compressed SEC1 encoding of the ephemeral public key, carried
    /// in the envelope so recipients can agree on the same secret.
    pub fn public_bytes(&self) -> Vec<u8> {
        self.secret
            .public_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    /// Derives the wrapping key shared with one recipient.
    pub fn wrap_key_for(&self, recipient: &PublicKey) -> WrapKey {
        let shared = self.secret.diffie_hellman(recipient);
        WrapKey(sha256(shared.raw_secret_bytes().as_slice()))
    }
}

// ---------------------------------------------------------------------------
// Static side (recipient)
// ---------------------------------------------------------------------------

/// Derives the wrapping key from the recipient's static secret and
/// the envelope's ephemeral public key. Mirrors
/// [`EnvelopeEphemeral::wrap_key_for`].
pub fn wrap_key_with_static(secret: &SecretKey, ephemeral_pub: &PublicKey) -> WrapKey {
    let shared = k256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), ephemeral_pub.as_affine());
    WrapKey(sha256(shared.raw_secret_bytes().as_slice()))
}

// ---------------------------------------------------------------------------
// Content-key wrapping
// ---------------------------------------------------------------------------

/// Seals the content key for one recipient: `nonce || ct || tag`.
pub fn wrap_content_key(wrap_key: &WrapKey, content_key: &[u8; 32]) -> Result<Vec<u8>> {
    let nonce = aead::generate_nonce();
    let sealed = aead::encrypt(wrap_key.as_bytes(), &nonce, content_key, b"")?;
    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Reverses [`wrap_content_key`]. Fails when this wrapped key was not
/// sealed under `wrap_key` — the normal case for every recipient slot
/// not addressed to us.
pub fn unwrap_content_key(wrap_key: &WrapKey, wrapped: &[u8]) -> Result<[u8; 32]> {
    if wrapped.len() < NONCE_LEN {
        return Err(DepinError::Crypto {
            reason: "wrapped key too short".into(),
        });
    }
    let (nonce, sealed) = wrapped.split_at(NONCE_LEN);
    let mut plain = aead::decrypt(wrap_key.as_bytes(), nonce, sealed, b"")?;
    if plain.len() != 32 {
        plain.zeroize();
        return Err(DepinError::Crypto {
            reason: "wrapped key has wrong payload length".into(),
        });
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&plain);
    plain.zeroize();
    Ok(key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
