//! The server-side privacy layer ("pool" wrapping).
//!
//! When the node advertises a pool public key, submitted envelopes are
//! sealed to that key so the relay operator learns the sender address
//! only inside an encrypted wrapper, and `msg_receive` responses come
//! back sealed to the holder's own key. Both directions use the same
//! layout:
//!
//! ```text
//! vector  ephemeral_pubkey     compressed SEC1
//! vector  nonce(12) || AES-256-GCM ciphertext || tag
//! ```
//!
//! The outbound plaintext is the JSON object
//! `{"payload": <envelope hex>, "sender": <address>}`; the inbound
//! plaintext is the JSON array of message records.

use depinchat_types::{Address, DepinError, Result};
use serde::Serialize;

use crate::aead::{self, NONCE_LEN};
use crate::ecdh::{parse_public_key, wrap_key_with_static, EnvelopeEphemeral};
use crate::keys::KeyMaterial;
use crate::wire::{write_vector, Reader};

#[derive(Serialize)]
struct PoolPayload<'a> {
    payload: &'a str,
    sender: &'a str,
}

/// Seals an already-built envelope to the pool public key.
pub fn wrap(payload_hex: &str, pool_pubkey_hex: &str, sender: &Address) -> Result<String> {
    let pool_key_bytes = hex::decode(pool_pubkey_hex).map_err(|_| DepinError::Crypto {
        reason: "pool public key is not valid hex".into(),
    })?;
    let pool_key = parse_public_key(&pool_key_bytes)?;

    let plaintext = serde_json::to_vec(&PoolPayload {
        payload: payload_hex,
        sender: sender.as_str(),
    })
    .map_err(|e| DepinError::Crypto {
        reason: format!("pool payload serialization failed: {e}"),
    })?;

    let ephemeral = EnvelopeEphemeral::generate();
    let key = ephemeral.wrap_key_for(&pool_key);

    seal(&ephemeral, &key, &plaintext)
}

/// Reverses the pool layer on an inbound `{encrypted: …}` response.
pub fn unwrap(encrypted_hex: &str, keys: &KeyMaterial) -> Result<String> {
    let bytes = hex::decode(encrypted_hex.trim()).map_err(|_| DepinError::Crypto {
        reason: "pool response is not valid hex".into(),
    })?;

    let mut reader = Reader::new(&bytes);
    let ephemeral_bytes = reader.read_vector()?;
    let sealed = reader.read_vector()?;

    let ephemeral_pub = parse_public_key(ephemeral_bytes)?;
    let key = wrap_key_with_static(keys.secret_key(), &ephemeral_pub);

    if sealed.len() < NONCE_LEN {
        return Err(DepinError::Crypto {
            reason: "pool response too short".into(),
        });
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let plaintext = aead::decrypt(key.as_bytes(), nonce, ciphertext, b"")?;

    String::from_utf8(plaintext).map_err(|_| DepinError::Crypto {
        reason: "pool plaintext is not UTF-8".into(),
    })
}

fn seal(
    ephemeral: &EnvelopeEphemeral,
    key: &crate::ecdh::WrapKey,
    plaintext: &[u8],
) -> Result<String> {
    let nonce = aead::generate_nonce();
    let ciphertext = aead::encrypt(key.as_bytes(), &nonce, plaintext, b"")?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);

    let mut out = Vec::new();
    write_vector(&mut out, &ephemeral.public_bytes());
    write_vector(&mut out, &sealed);
    Ok(hex::encode(out))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
