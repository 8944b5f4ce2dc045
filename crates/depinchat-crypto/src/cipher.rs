//! [`EnvelopeCipher`] — the production [`MessageCipher`] implementation.
//!
//! Stateless adapter between the engine-facing trait (hex strings,
//! WIF keys) and the typed envelope/pool modules.

use depinchat_types::{
    Address, BuiltEnvelope, DepinError, EnvelopeParams, MessageCipher, Result,
};

use crate::envelope::{self, SigningContext};
use crate::keys::KeyMaterial;
use crate::pool;

/// Production envelope cryptography on secp256k1 + AES-256-GCM.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvelopeCipher;

impl EnvelopeCipher {
    pub fn new() -> Self {
        Self
    }
}

impl MessageCipher for EnvelopeCipher {
    fn build_envelope(&self, params: &EnvelopeParams<'_>) -> Result<BuiltEnvelope> {
        let keys = KeyMaterial::from_wif(params.sender_private_key)?;
        if keys.pubkey_hex() != params.sender_pubkey.as_hex() {
            return Err(DepinError::Crypto {
                reason: "signing key does not match the revealed sender pubkey".into(),
            });
        }

        let recipient_bytes: Vec<Vec<u8>> = params
            .recipient_pubkeys
            .iter()
            .map(|p| p.to_bytes())
            .collect();

        let kind = params.kind.to_string();
        let built = envelope::build(
            params.message,
            &recipient_bytes,
            &keys,
            &SigningContext {
                token: params.token,
                sender_address: params.sender_address.as_str(),
                timestamp: params.timestamp,
                kind: &kind,
            },
        )?;

        Ok(BuiltEnvelope {
            hex: hex::encode(&built.bytes),
            message_hash: built.message_hash,
        })
    }

    fn open_envelope(
        &self,
        encrypted_payload_hex: &str,
        recipient_private_key: &str,
    ) -> Result<String> {
        let bytes = hex::decode(encrypted_payload_hex.trim()).map_err(|_| DepinError::Crypto {
            reason: "envelope is not valid hex".into(),
        })?;
        let keys = KeyMaterial::from_wif(recipient_private_key)?;
        envelope::open(&bytes, &keys)
    }

    fn wrap_for_pool(
        &self,
        payload_hex: &str,
        pool_pubkey_hex: &str,
        sender_address: &Address,
    ) -> Result<String> {
        pool::wrap(payload_hex, pool_pubkey_hex, sender_address)
    }

    fn unwrap_from_pool(&self, encrypted_hex: &str, recipient_private_key: &str) -> Result<String> {
        let keys = KeyMaterial::from_wif(recipient_private_key)?;
        pool::unwrap(encrypted_hex, &keys)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
