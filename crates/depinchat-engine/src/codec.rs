//! Envelope codec: recipient-table parsing and the cipher adapter.
//!
//! The cipher behind [`MessageCipher`] is a black box to the engine,
//! with one deliberate exception: resolving the peer of our *own*
//! outgoing private messages after a restart requires reading the
//! recipient-hash table out of the raw ciphertext. That parsing is
//! done here, on bytes, without consulting the cipher.

use std::sync::Arc;

use depinchat_crypto::wire::Reader;
use depinchat_types::{
    Address, BuiltEnvelope, MessageCipher, MessageKind, Pubkey, Result,
};

use crate::Identity;

/// Byte length of one recipient fingerprint in the table.
const RECIPIENT_HASH_LEN: usize = 20;

// ---------------------------------------------------------------------------
// Recipient-table extraction
// ---------------------------------------------------------------------------

/// Extracts the recipient hashes from a raw envelope.
///
/// Any parse error — bad hex, truncated frame, oversized count —
/// yields an empty list; classification then falls back to treating
/// the message as a group broadcast.
pub fn extract_recipient_hashes(encrypted_payload_hex: &str) -> Vec<String> {
    try_extract(encrypted_payload_hex).unwrap_or_default()
}

fn try_extract(encrypted_payload_hex: &str) -> Result<Vec<String>> {
    let bytes = hex::decode(encrypted_payload_hex.trim()).map_err(|_| {
        depinchat_types::DepinError::Message {
            reason: "envelope is not valid hex".into(),
        }
    })?;

    let mut reader = Reader::new(&bytes);
    reader.skip_vector()?; // ephemeral pubkey
    reader.skip_vector()?; // encrypted body
    let count = reader.read_compact_size()?;

    let mut hashes = Vec::new();
    for _ in 0..count {
        // A table that simply ends early is tolerated; a torn entry
        // (hash present, wrapped key truncated) is an error and drops
        // the whole list.
        if reader.remaining() < RECIPIENT_HASH_LEN {
            break;
        }
        let key_id: [u8; RECIPIENT_HASH_LEN] = reader.read_array()?;
        reader.skip_vector()?;
        hashes.push(hex::encode(key_id));
    }
    Ok(hashes)
}

// ---------------------------------------------------------------------------
// EnvelopeCodec
// ---------------------------------------------------------------------------

/// Thin adapter binding the cipher to the local identity and token.
///
/// Saves every call site from re-assembling
/// [`EnvelopeParams`](depinchat_types::EnvelopeParams) by hand.
#[derive(Clone)]
pub struct EnvelopeCodec {
    cipher: Arc<dyn MessageCipher>,
    identity: Identity,
    token: String,
}

impl EnvelopeCodec {
    pub fn new(cipher: Arc<dyn MessageCipher>, identity: Identity, token: String) -> Self {
        Self {
            cipher,
            identity,
            token,
        }
    }

    /// Builds an envelope from this identity to `recipients`.
    pub fn build(
        &self,
        message: &str,
        recipients: &[Pubkey],
        timestamp: u64,
        kind: MessageKind,
    ) -> Result<BuiltEnvelope> {
        self.cipher.build_envelope(&depinchat_types::EnvelopeParams {
            token: &self.token,
            sender_address: &self.identity.address,
            sender_pubkey: &self.identity.pubkey,
            sender_private_key: &self.identity.private_key,
            timestamp,
            message,
            recipient_pubkeys: recipients,
            kind,
        })
    }

    /// Attempts to decrypt an envelope with our own key.
    pub fn open(&self, encrypted_payload_hex: &str) -> Result<String> {
        self.cipher
            .open_envelope(encrypted_payload_hex, &self.identity.private_key)
    }

    /// Wraps a payload for the pool privacy layer.
    pub fn wrap_for_pool(&self, payload_hex: &str, pool_pubkey_hex: &str) -> Result<String> {
        self.cipher
            .wrap_for_pool(payload_hex, pool_pubkey_hex, &self.identity.address)
    }

    /// Unwraps a pool-sealed `msg_receive` response.
    pub fn unwrap_from_pool(&self, encrypted_hex: &str) -> Result<String> {
        self.cipher
            .unwrap_from_pool(encrypted_hex, &self.identity.private_key)
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// The local address, used constantly during classification.
    pub fn self_address(&self) -> &Address {
        &self.identity.address
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
