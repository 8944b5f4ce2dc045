//! Envelope build and open on the binary wire format.
//!
//! # Wire layout
//!
//! ```text
//! vector   ephemeral_pubkey      compressed SEC1, 33 bytes
//! vector   encrypted_body        nonce(12) || AES-256-GCM ct || tag(16)
//! compact  recipient_count
//! repeat   recipient_hash        hash160(recipient_pubkey), 20 bytes
//!          vector wrapped_key    nonce(12) || sealed content key || tag
//! vector   signature             DER ECDSA by the sender
//! ```
//!
//! The body is encrypted once under a random content key; the content
//! key is wrapped separately for every recipient via ephemeral ECDH.
//! Opening tries the slot matching our own `hash160` first and falls
//! back to every slot, so an envelope with a reversed or missing hash
//! still decrypts when a wrapped key authenticates.

use depinchat_types::{DepinError, Result};
use k256::ecdsa::signature::Signer;
use k256::ecdsa::{DerSignature, Signature};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use crate::aead::{self, NONCE_LEN};
use crate::ecdh::{
    parse_public_key, unwrap_content_key, wrap_content_key, wrap_key_with_static,
    EnvelopeEphemeral,
};
use crate::hash::{hash160, sha256d};
use crate::keys::KeyMaterial;
use crate::wire::{write_compact_size, write_vector, Reader};

/// Byte length of a recipient fingerprint.
pub const RECIPIENT_HASH_LEN: usize = 20;

/// A built envelope plus the hash the node will key the record by.
pub struct BuiltEnvelopeBytes {
    /// Complete envelope, signature included.
    pub bytes: Vec<u8>,
    /// `sha256d` of the complete envelope, lowercase hex.
    pub message_hash: String,
}

/// Context folded into the signature preimage alongside the envelope
/// serialization, binding it to the token, sender, and send time.
pub struct SigningContext<'a> {
    pub token: &'a str,
    pub sender_address: &'a str,
    pub timestamp: u64,
    pub kind: &'a str,
}

impl SigningContext<'_> {
    fn preimage_suffix(&self) -> Vec<u8> {
        format!(
            "{}|{}|{}|{}",
            self.token, self.sender_address, self.timestamp, self.kind
        )
        .into_bytes()
    }
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// Builds and signs an envelope addressed to `recipient_pubkeys`.
///
/// # Errors
///
/// - [`DepinError::Crypto`] when a recipient key fails SEC1 parsing
///   or any AEAD step fails.
/// - [`DepinError::NoRecipients`] for an empty recipient list — a
///   body nobody can unwrap must never reach the pool.
pub fn build(
    message: &str,
    recipient_pubkeys: &[Vec<u8>],
    signer: &KeyMaterial,
    context: &SigningContext<'_>,
) -> Result<BuiltEnvelopeBytes> {
    if recipient_pubkeys.is_empty() {
        return Err(DepinError::NoRecipients);
    }

    let ephemeral = EnvelopeEphemeral::generate();

    // One random content key for the body, wrapped per recipient.
    let mut content_key = [0u8; 32];
    OsRng.fill_bytes(&mut content_key);

    let body_nonce = aead::generate_nonce();
    let body_ct = aead::encrypt(&content_key, &body_nonce, message.as_bytes(), b"")?;
    let mut body = Vec::with_capacity(NONCE_LEN + body_ct.len());
    body.extend_from_slice(&body_nonce);
    body.extend_from_slice(&body_ct);

    let mut unsigned = Vec::new();
    write_vector(&mut unsigned, &ephemeral.public_bytes());
    write_vector(&mut unsigned, &body);
    write_compact_size(&mut unsigned, recipient_pubkeys.len() as u64);

    for pubkey_bytes in recipient_pubkeys {
        let recipient = parse_public_key(pubkey_bytes)?;
        let wrapped = wrap_content_key(&ephemeral.wrap_key_for(&recipient), &content_key)?;
        unsigned.extend_from_slice(&hash160(pubkey_bytes));
        write_vector(&mut unsigned, &wrapped);
    }
    content_key.zeroize();

    let mut preimage = unsigned.clone();
    preimage.extend_from_slice(&context.preimage_suffix());
    let signature: Signature = signer.signing_key().sign(&sha256d(&preimage));
    let der: DerSignature = signature.to_der();

    let mut bytes = unsigned;
    write_vector(&mut bytes, der.as_bytes());

    let message_hash = hex::encode(sha256d(&bytes));
    Ok(BuiltEnvelopeBytes {
        bytes,
        message_hash,
    })
}

// ---------------------------------------------------------------------------
// Open
// ---------------------------------------------------------------------------

/// Decrypts an envelope with the holder's key material.
///
/// Fails when no wrapped key authenticates under our shared secret —
/// the expected outcome for every envelope not addressed to us.
pub fn open(bytes: &[u8], keys: &KeyMaterial) -> Result<String> {
    let mut reader = Reader::new(bytes);
    let ephemeral_bytes = reader.read_vector()?;
    let body = reader.read_vector()?;
    let recipient_count = reader.read_compact_size()?;

    let ephemeral_pub = parse_public_key(ephemeral_bytes)?;
    let wrap_key = wrap_key_with_static(keys.secret_key(), &ephemeral_pub);
    let own_hash = hash160(&hex::decode(keys.pubkey_hex()).unwrap_or_default());

    let mut matching: Option<Vec<u8>> = None;
    let mut others: Vec<Vec<u8>> = Vec::new();
    for _ in 0..recipient_count {
        let key_id: [u8; RECIPIENT_HASH_LEN] = reader.read_array()?;
        let wrapped = reader.read_vector()?.to_vec();
        if key_id == own_hash && matching.is_none() {
            matching = Some(wrapped);
        } else {
            others.push(wrapped);
        }
    }

    // Our own slot first, then every other slot: a reversed or stale
    // fingerprint must not lock us out of a key that authenticates.
    let mut content_key = None;
    for wrapped in matching.iter().chain(others.iter()) {
        if let Ok(key) = unwrap_content_key(&wrap_key, wrapped) {
            content_key = Some(key);
            break;
        }
    }
    let mut content_key = content_key.ok_or(DepinError::Crypto {
        reason: "envelope is not addressed to this key".into(),
    })?;

    if body.len() < NONCE_LEN {
        content_key.zeroize();
        return Err(DepinError::Crypto {
            reason: "envelope body too short".into(),
        });
    }
    let (nonce, ciphertext) = body.split_at(NONCE_LEN);
    let plaintext = aead::decrypt(&content_key, nonce, ciphertext, b"");
    content_key.zeroize();

    String::from_utf8(plaintext?).map_err(|_| DepinError::Crypto {
        reason: "decrypted body is not UTF-8".into(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
