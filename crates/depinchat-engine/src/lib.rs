//! The DepinChat messaging engine.
//!
//! Everything between the node RPC and the on-screen log lives here:
//!
//! - [`cache`] — single-flight TTL cache.
//! - [`directory`] — token-holder directory with the recipient-hash
//!   map used to address and classify ciphertexts.
//! - [`codec`] — envelope recipient-table parsing and the adapter
//!   over the [`MessageCipher`](depinchat_types::MessageCipher)
//!   boundary.
//! - [`store`] — the ordered, deduplicated in-memory message log.
//! - [`poller`] — incremental fetch → decrypt → classify → emit.
//! - [`sender`] — parse input → resolve keys → build → wrap → submit.
//! - [`supervisor`] — gating preconditions, retry countdown, poller
//!   lifecycle, full resync after an outage.
//! - [`engine`] — the single task wiring all of the above together.
//!
//! The engine runs as one tokio task owning every piece of mutable
//! state; commands arrive over an mpsc channel and UI events leave
//! over another. There is no shared-memory mutation from outside.

pub mod cache;
pub mod codec;
pub mod directory;
pub mod engine;
pub mod poller;
pub mod sender;
pub mod store;
pub mod supervisor;

use depinchat_types::{Address, Pubkey};

/// Recipient directory TTL.
pub const RECIPIENT_CACHE_REFRESH_MS: u64 = 60_000;

/// Supervisor verification retry period.
pub const VERIFICATION_RETRY_MS: u64 = 30_000;

/// Delay between a successful send and the forced poll that makes the
/// sent message appear in the log.
pub const FORCE_POLL_DELAY_MS: u64 = 2_000;

/// Current UNIX time in seconds.
pub(crate) fn now_unix_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The local holder's identity, threaded through the engine.
///
/// Built by the CLI from the unlocked wallet; the engine itself never
/// decodes key material.
#[derive(Clone)]
pub struct Identity {
    /// Own wallet address.
    pub address: Address,
    /// Own compressed public key.
    pub pubkey: Pubkey,
    /// Own signing key in WIF form, passed to the cipher boundary.
    pub private_key: String,
}
