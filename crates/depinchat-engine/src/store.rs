//! The in-memory message log.
//!
//! Rebuilt from the pool on every start — nothing persists between
//! runs. Deduplicates on `(hash, signature)`, keeps the log in
//! `(timestamp asc, hash asc)` order, and tracks which of our own
//! outgoing private messages went to whom so the next poll can
//! classify them without parsing the ciphertext.

use std::collections::{HashMap, HashSet};

use depinchat_types::{Address, StoredMessage};

/// Ordered, deduplicated message log plus the outgoing-private map.
#[derive(Default)]
pub struct MessageStore {
    messages: Vec<StoredMessage>,
    seen: HashSet<String>,
    outgoing_private: HashMap<String, Address>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a message unless its `(hash, signature)` pair is
    /// already present. Returns whether the message was new.
    pub fn add(&mut self, message: StoredMessage) -> bool {
        if !self.seen.insert(message.dedup_key()) {
            return false;
        }
        self.messages.push(message);
        self.messages
            .sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.hash.cmp(&b.hash)));
        true
    }

    /// The canonical log, oldest first.
    pub fn messages(&self) -> &[StoredMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Highest timestamp in the log, or 0 when empty. Drives the
    /// incremental `since_ts` poll parameter.
    pub fn last_timestamp(&self) -> u64 {
        self.messages.last().map(|m| m.timestamp).unwrap_or(0)
    }

    /// Records the peer of a just-submitted private message, keyed by
    /// the envelope hash. Entries never expire within a run.
    pub fn register_outgoing_private(&mut self, hash: impl Into<String>, peer: Address) {
        self.outgoing_private.insert(hash.into(), peer);
    }

    /// Looks up the peer of one of our own private messages.
    pub fn lookup_outgoing_private(&self, hash: &str) -> Option<&Address> {
        self.outgoing_private.get(hash)
    }

    /// Full reset, used when a reconnection replays the pool.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.seen.clear();
        self.outgoing_private.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
