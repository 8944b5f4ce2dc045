//! SHA-256, double SHA-256, and `hash160`.
//!
//! `hash160` (RIPEMD-160 over SHA-256) is the 20-byte fingerprint the
//! envelope format uses to address a wrapped key to a recipient
//! public key. Double SHA-256 is the chain's message-digest
//! convention, used for envelope hashes and WIF checksums.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Computes the SHA-256 hash of arbitrary data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// Computes `SHA-256(SHA-256(data))`.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Computes `RIPEMD-160(SHA-256(data))`, the 20-byte recipient
/// fingerprint.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(&Ripemd160::digest(Sha256::digest(data)));
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
