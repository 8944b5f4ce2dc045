//! Encrypted-at-rest storage of the WIF signing key.
//!
//! # Record layout
//!
//! The persisted form is a single string of four lowercase-hex fields
//! separated by colons:
//!
//! ```text
//! salt(32B) : iv(12B) : tag(16B) : ciphertext
//! ```
//!
//! The key is derived with scrypt `(N=16384, r=8, p=1)` and the WIF
//! is sealed with AES-256-GCM. On decrypt the IV length is taken from
//! the record, so records written with 16-byte IVs still parse.
//!
//! # Error discipline
//!
//! Only a wrong field count reports [`DepinError::MalformedSecret`].
//! Every later failure — bad hex, derivation, tag mismatch — reports
//! [`DepinError::BadPassword`], so an attacker probing the record
//! learns nothing about which check rejected it.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::aes::Aes256;
use aes_gcm::{Aes256Gcm, AesGcm, Key, Nonce};
use depinchat_types::{DepinError, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

/// Salt length written by [`encrypt`].
pub const SALT_LEN: usize = 32;

/// IV length written by [`encrypt`]. Decrypt accepts 12–16 bytes.
pub const IV_LEN: usize = 12;

/// AES-GCM tag length.
pub const TAG_LEN: usize = 16;

/// scrypt cost parameter N (log2 form for the `scrypt` crate).
const SCRYPT_LOG_N: u8 = 14; // N = 16384

/// scrypt block size.
const SCRYPT_R: u32 = 8;

/// scrypt parallelism.
const SCRYPT_P: u32 = 1;

/// Accepted password lengths, inclusive.
pub const MIN_PASSWORD_LEN: usize = 4;
pub const MAX_PASSWORD_LEN: usize = 30;

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

fn derive_key(password: &str, salt: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
    let params =
        scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, 32).map_err(|_| DepinError::Crypto {
            reason: "invalid scrypt parameters".into(),
        })?;
    let mut key = Zeroizing::new([0u8; 32]);
    scrypt::scrypt(password.as_bytes(), salt, &params, key.as_mut())
        .map_err(|_| DepinError::Crypto {
            reason: "scrypt derivation failed".into(),
        })?;
    Ok(key)
}

/// Validates the password length policy.
pub fn check_password_policy(password: &str) -> Result<()> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(DepinError::Message {
            reason: format!(
                "password must be {MIN_PASSWORD_LEN}-{MAX_PASSWORD_LEN} characters, got {len}"
            ),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Encrypt
// ---------------------------------------------------------------------------

/// Seals a WIF under a password, producing the `salt:iv:tag:ct` record.
pub fn encrypt(wif: &str, password: &str) -> Result<String> {
    check_password_policy(password)?;

    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let key = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_ref()));
    let mut sealed = cipher
        .encrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: wif.as_bytes(),
                aad: b"",
            },
        )
        .map_err(|_| DepinError::Crypto {
            reason: "AES-256-GCM encryption failed".into(),
        })?;

    // aes-gcm appends the tag; the record stores it as its own field.
    let tag_start = sealed.len() - TAG_LEN;
    let record = format!(
        "{}:{}:{}:{}",
        hex::encode(salt),
        hex::encode(iv),
        hex::encode(&sealed[tag_start..]),
        hex::encode(&sealed[..tag_start]),
    );
    sealed.zeroize();
    Ok(record)
}

// ---------------------------------------------------------------------------
// Decrypt
// ---------------------------------------------------------------------------

/// Opens a `salt:iv:tag:ct` record with a password, returning the WIF.
pub fn decrypt(encoded: &str, password: &str) -> Result<Zeroizing<String>> {
    let fields: Vec<&str> = encoded.split(':').collect();
    let [salt_hex, iv_hex, tag_hex, ct_hex] = fields.as_slice() else {
        return Err(DepinError::MalformedSecret);
    };

    // From here on every failure is a BadPassword: the caller must
    // not be able to tell hex rot from a wrong key.
    let salt = hex::decode(salt_hex).map_err(|_| DepinError::BadPassword)?;
    let iv = hex::decode(iv_hex).map_err(|_| DepinError::BadPassword)?;
    let tag = hex::decode(tag_hex).map_err(|_| DepinError::BadPassword)?;
    let ct = hex::decode(ct_hex).map_err(|_| DepinError::BadPassword)?;

    let key = derive_key(password, &salt).map_err(|_| DepinError::BadPassword)?;

    let mut sealed = Vec::with_capacity(ct.len() + tag.len());
    sealed.extend_from_slice(&ct);
    sealed.extend_from_slice(&tag);
    let payload = Payload {
        msg: sealed.as_slice(),
        aad: b"",
    };

    // The record dictates the IV width: 12 bytes is what this client
    // writes, 16 bytes appears in records migrated from older tools.
    let decrypted = match iv.len() {
        12 => Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_ref()))
            .decrypt(Nonce::from_slice(&iv), payload),
        16 => AesGcm::<Aes256, U16>::new(Key::<Aes256Gcm>::from_slice(key.as_ref()))
            .decrypt(aes_gcm::Nonce::<U16>::from_slice(&iv), payload),
        _ => return Err(DepinError::BadPassword),
    };
    let mut plain = decrypted.map_err(|_| DepinError::BadPassword)?;

    let wif = String::from_utf8(plain.clone());
    plain.zeroize();
    match wif {
        Ok(s) => Ok(Zeroizing::new(s)),
        Err(_) => Err(DepinError::BadPassword),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
