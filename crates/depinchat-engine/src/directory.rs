//! The recipient directory: token holders and their revealed keys.
//!
//! Backed by `list_depin_addresses` with a TTL cache. Each refresh
//! also derives the recipient-hash map — `hash160(pubkey)` in both
//! forward and byte-reversed hex — used to resolve the peer of our
//! own private messages out of a raw envelope. Some node encodings
//! expose the hash byte-reversed, so the lookup must succeed either
//! way; the forward form always wins on collision.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use depinchat_crypto::hash::hash160;
use depinchat_rpc::NodeRpc;
use depinchat_types::{Address, DepinError, Pubkey, RecipientEntry, Result};

use crate::cache::Cache;
use crate::RECIPIENT_CACHE_REFRESH_MS;

/// One refreshed view of the holder set.
#[derive(Clone, Default)]
pub struct DirectorySnapshot {
    /// Holders with revealed keys, as returned by the node.
    pub entries: Vec<RecipientEntry>,
    /// `hex(hash160(pubkey))` and `hex(reverse(hash160(pubkey)))`,
    /// both mapping to the holder address. Non-empty iff `entries`
    /// is non-empty.
    pub hash_map: HashMap<String, Address>,
}

impl DirectorySnapshot {
    fn from_entries(entries: Vec<RecipientEntry>) -> Self {
        let mut hash_map = HashMap::with_capacity(entries.len() * 2);
        for entry in &entries {
            let digest = hash160(&entry.pubkey.to_bytes());
            let forward = hex::encode(digest);
            let mut reversed_bytes = digest;
            reversed_bytes.reverse();
            let reversed = hex::encode(reversed_bytes);

            // First writer wins; the reversed form never displaces a
            // forward entry.
            hash_map
                .entry(forward)
                .or_insert_with(|| entry.address.clone());
            hash_map
                .entry(reversed)
                .or_insert_with(|| entry.address.clone());
        }
        Self { entries, hash_map }
    }
}

/// TTL-cached directory of token holders.
pub struct RecipientDirectory<R> {
    rpc: Arc<R>,
    token: String,
    snapshot: Cache<DirectorySnapshot>,
}

impl<R: NodeRpc> RecipientDirectory<R> {
    pub fn new(rpc: Arc<R>, token: String) -> Self {
        Self {
            rpc,
            token,
            snapshot: Cache::new(Duration::from_millis(RECIPIENT_CACHE_REFRESH_MS)),
        }
    }

    /// Serves the cached snapshot when fresh, refreshing otherwise.
    /// Concurrent callers share one in-flight refresh; on failure the
    /// stale snapshot is served when one exists.
    pub async fn refresh(&self, force: bool) -> Result<DirectorySnapshot> {
        let rpc = self.rpc.clone();
        let token = self.token.clone();
        self.snapshot
            .get_or_refresh(force, move || async move {
                fetch_snapshot(rpc.as_ref(), &token).await
            })
            .await
    }

    /// All revealed public keys — the group-broadcast audience.
    pub async fn pubkeys(&self) -> Result<Vec<Pubkey>> {
        Ok(self
            .refresh(false)
            .await?
            .entries
            .iter()
            .map(|e| e.pubkey.clone())
            .collect())
    }

    /// The recipient-hash map for envelope classification.
    pub async fn hash_map(&self) -> Result<HashMap<String, Address>> {
        Ok(self.refresh(false).await?.hash_map)
    }

    /// Resolves one holder's public key, force-refreshing once on a
    /// miss before giving up.
    pub async fn pubkey_for(&self, address: &Address) -> Result<Pubkey> {
        if let Some(pk) = self.lookup(address, false).await? {
            return Ok(pk);
        }
        if let Some(pk) = self.lookup(address, true).await? {
            return Ok(pk);
        }
        Err(DepinError::RecipientPubkeyNotRevealed {
            address: address.clone(),
        })
    }

    async fn lookup(&self, address: &Address, force: bool) -> Result<Option<Pubkey>> {
        let snapshot = self.refresh(force).await?;
        Ok(snapshot
            .entries
            .iter()
            .find(|e| &e.address == address)
            .map(|e| e.pubkey.clone()))
    }
}

/// Fetches and filters the holder list.
///
/// Rows missing an address or pubkey are dropped silently — holders
/// that have not revealed a key yet are expected, not errors. An
/// empty filtered list is [`DepinError::NoRecipients`].
async fn fetch_snapshot<R: NodeRpc>(rpc: &R, token: &str) -> Result<DirectorySnapshot> {
    let rows = rpc.list_depin_addresses(token).await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let (Some(address), Some(pubkey)) = (row.address, row.pubkey) else {
            continue;
        };
        let Ok(pubkey) = Pubkey::parse(&pubkey) else {
            tracing::debug!(%address, "dropping holder with unparsable pubkey");
            continue;
        };
        entries.push(RecipientEntry {
            address: Address::new(address),
            pubkey,
        });
    }

    if entries.is_empty() {
        return Err(DepinError::NoRecipients);
    }
    Ok(DirectorySnapshot::from_entries(entries))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
