//! The unlocked in-memory wallet.
//!
//! Built once at startup from the decrypted WIF. Holds the signing
//! key material, the derived compressed public key, and the P2PKH
//! address the node knows this holder by.

use depinchat_crypto::keys::{address_from_pubkey, KeyMaterial};
use depinchat_types::{Address, Pubkey, Result};
use zeroize::Zeroizing;

/// The local holder's identity for one client run.
pub struct Wallet {
    wif: Zeroizing<String>,
    keys: KeyMaterial,
    address: Address,
    pubkey: Pubkey,
}

impl Wallet {
    /// Derives keys and address from a decrypted WIF.
    pub fn from_wif(wif: Zeroizing<String>) -> Result<Self> {
        let keys = KeyMaterial::from_wif(&wif)?;
        let pubkey = keys.pubkey();
        let address = Address::new(address_from_pubkey(&pubkey.to_bytes()));
        Ok(Self {
            wif,
            keys,
            address,
            pubkey,
        })
    }

    /// The holder's own address; `msg_receive` polls for it.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Compressed public key, as revealed on-chain.
    pub fn pubkey(&self) -> &Pubkey {
        &self.pubkey
    }

    /// The WIF, for the cipher boundary.
    pub fn wif(&self) -> &str {
        &self.wif
    }

    /// Signing key material.
    pub fn keys(&self) -> &KeyMaterial {
        &self.keys
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
