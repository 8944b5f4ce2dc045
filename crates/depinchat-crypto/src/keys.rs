//! WIF decoding and secp256k1 key material.
//!
//! The chain serialises private keys in WIF: base58check over
//! `version || secret(32) [|| 0x01]`, where the trailing byte marks a
//! compressed public key. The client always derives the compressed
//! form, matching what holders reveal on-chain.

use depinchat_types::{DepinError, Pubkey, Result};
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::SecretKey;
use zeroize::Zeroize;

use crate::hash::sha256d;

/// WIF version byte for the `xna` network.
pub const WIF_VERSION: u8 = 0x80;

/// P2PKH address version byte for the `xna` network.
pub const ADDRESS_VERSION: u8 = 0x35;

// ---------------------------------------------------------------------------
// WIF decode / encode
// ---------------------------------------------------------------------------

/// Decodes a WIF string into the raw 32-byte secret and the
/// compressed-pubkey flag.
///
/// # Errors
///
/// [`DepinError::InvalidWif`] on bad base58, bad length, checksum
/// mismatch, or a secret outside the curve order (caught later by
/// key construction).
pub fn decode_wif(wif: &str) -> Result<([u8; 32], bool)> {
    let mut raw = bs58::decode(wif.trim())
        .into_vec()
        .map_err(|e| DepinError::InvalidWif {
            reason: format!("not base58: {e}"),
        })?;

    // version(1) + secret(32) + [compressed(1)] + checksum(4)
    if raw.len() != 37 && raw.len() != 38 {
        let len = raw.len();
        raw.zeroize();
        return Err(DepinError::InvalidWif {
            reason: format!("unexpected length {len}"),
        });
    }

    let (payload, checksum) = raw.split_at(raw.len() - 4);
    if sha256d(payload)[..4] != *checksum {
        raw.zeroize();
        return Err(DepinError::InvalidWif {
            reason: "checksum mismatch".into(),
        });
    }

    let compressed = payload.len() == 34;
    if compressed && payload[33] != 0x01 {
        raw.zeroize();
        return Err(DepinError::InvalidWif {
            reason: "bad compressed-key marker".into(),
        });
    }

    let mut secret = [0u8; 32];
    secret.copy_from_slice(&payload[1..33]);
    raw.zeroize();
    Ok((secret, compressed))
}

/// Encodes a raw secret as WIF. Used by tests and key tooling.
pub fn encode_wif(secret: &[u8; 32], compressed: bool) -> String {
    let mut payload = Vec::with_capacity(38);
    payload.push(WIF_VERSION);
    payload.extend_from_slice(secret);
    if compressed {
        payload.push(0x01);
    }
    let checksum = sha256d(&payload);
    payload.extend_from_slice(&checksum[..4]);
    let encoded = bs58::encode(&payload).into_string();
    payload.zeroize();
    encoded
}

/// Derives the base58check P2PKH address for a public key:
/// `base58check(version || hash160(pubkey))`.
pub fn address_from_pubkey(pubkey_bytes: &[u8]) -> String {
    let mut payload = Vec::with_capacity(25);
    payload.push(ADDRESS_VERSION);
    payload.extend_from_slice(&crate::hash::hash160(pubkey_bytes));
    let checksum = sha256d(&payload);
    payload.extend_from_slice(&checksum[..4]);
    bs58::encode(payload).into_string()
}

// ---------------------------------------------------------------------------
// KeyMaterial
// ---------------------------------------------------------------------------

/// A decoded secp256k1 keypair.
///
/// The secret is held inside `k256::SecretKey`, which zeroizes on
/// drop. No `Clone`/`Debug` to prevent leakage.
pub struct KeyMaterial {
    secret: SecretKey,
    pubkey: Pubkey,
}

impl KeyMaterial {
    /// Decodes a WIF string and derives the compressed public key.
    pub fn from_wif(wif: &str) -> Result<Self> {
        let (mut secret_bytes, _compressed) = decode_wif(wif)?;
        let secret = SecretKey::from_slice(&secret_bytes).map_err(|_| DepinError::InvalidWif {
            reason: "secret is not a valid curve scalar".into(),
        });
        secret_bytes.zeroize();
        let secret = secret?;
        let pubkey_hex = hex::encode(secret.public_key().to_encoded_point(true).as_bytes());
        let pubkey = Pubkey::parse(&pubkey_hex)?;
        Ok(Self { secret, pubkey })
    }

    /// Compressed public key.
    pub fn pubkey(&self) -> Pubkey {
        self.pubkey.clone()
    }

    /// Compressed public key as lowercase hex.
    pub fn pubkey_hex(&self) -> &str {
        self.pubkey.as_hex()
    }

    /// The underlying secret key, for ECDH.
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    /// Derives an ECDSA signing key view.
    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from(&self.secret)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_secret() -> [u8; 32] {
        let mut s = [0u8; 32];
        s[31] = 1; // the generator's secret scalar
        s
    }

    #[test]
    fn wif_roundtrip_compressed() -> Result<()> {
        let secret = test_secret();
        let wif = encode_wif(&secret, true);
        let (decoded, compressed) = decode_wif(&wif)?;
        assert_eq!(decoded, secret);
        assert!(compressed);
        Ok(())
    }

    #[test]
    fn wif_roundtrip_uncompressed() -> Result<()> {
        let secret = [0x42u8; 32];
        let wif = encode_wif(&secret, false);
        let (decoded, compressed) = decode_wif(&wif)?;
        assert_eq!(decoded, secret);
        assert!(!compressed);
        Ok(())
    }

    #[test]
    fn corrupted_wif_fails_checksum() {
        let wif = encode_wif(&test_secret(), true);
        // Flip the first character to another base58 digit.
        let mut chars: Vec<char> = wif.chars().collect();
        chars[0] = if chars[0] == '5' { '6' } else { '5' };
        let corrupted: String = chars.into_iter().collect();
        assert!(decode_wif(&corrupted).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_wif("not a wif").is_err());
        assert!(decode_wif("").is_err());
    }

    #[test]
    fn key_material_derives_generator_pubkey() -> Result<()> {
        let wif = encode_wif(&test_secret(), true);
        let keys = KeyMaterial::from_wif(&wif)?;
        assert_eq!(
            keys.pubkey_hex(),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
        Ok(())
    }

    #[test]
    fn zero_secret_is_rejected() {
        let wif = encode_wif(&[0u8; 32], true);
        assert!(KeyMaterial::from_wif(&wif).is_err());
    }
}
