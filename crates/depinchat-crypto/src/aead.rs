//! AES-256-GCM authenticated encryption.
//!
//! All symmetric encryption in the envelope format uses AES-256-GCM
//! with 96-bit nonces. The 16-byte tag is appended to the ciphertext.
//! Nonces come from OS entropy and must never repeat under one key.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use depinchat_types::{DepinError, Result};
use rand::rngs::OsRng;
use rand::RngCore;

/// Byte length of an AES-GCM nonce.
pub const NONCE_LEN: usize = 12;

/// Byte length of the appended authentication tag.
pub const TAG_LEN: usize = 16;

/// Generates a fresh 96-bit nonce from OS entropy.
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypts `plaintext`, returning ciphertext with the tag appended.
pub fn encrypt(key: &[u8; 32], nonce: &[u8; NONCE_LEN], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
        .map_err(|_| DepinError::Crypto {
            reason: "AES-256-GCM encryption failed".into(),
        })
}

/// Decrypts ciphertext produced by [`encrypt`].
///
/// Fails on wrong key, wrong nonce, wrong AAD, or tampering. The
/// nonce length is taken as-is so records written with longer IVs
/// can still be rejected cleanly rather than panicking.
pub fn decrypt(key: &[u8; 32], nonce: &[u8], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_LEN {
        return Err(DepinError::Crypto {
            reason: format!("unsupported nonce length {}", nonce.len()),
        });
    }
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| DepinError::Crypto {
            reason: "AES-256-GCM authentication failed".into(),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
