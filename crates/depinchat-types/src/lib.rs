//! Core shared types for the DepinChat client.
//!
//! This crate defines all types shared across the workspace: wallet
//! addresses, public keys, message records, the UI event bus, and the
//! central error enum. No other crate should define shared types —
//! everything lives here.

pub mod config;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// Wallet address on the underlying chain.
///
/// Opaque to the client: the node hands out addresses and the client
/// compares them by exact string equality. No checksum validation is
/// performed here — a mistyped address simply never matches a token
/// holder.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Creates an `Address` from any string-like value.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Pubkey
// ---------------------------------------------------------------------------

/// Compressed secp256k1 public key, canonicalised as lowercase hex.
///
/// Canonicalisation happens at construction so that two keys received
/// with different letter case compare and cache identically.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pubkey(String);

impl Pubkey {
    /// Creates a `Pubkey` from a hex string, lowercasing it.
    ///
    /// Rejects strings that are not valid hex of a plausible key
    /// length (33 or 65 bytes once decoded).
    pub fn parse(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let bytes = hex::decode(&lower).map_err(|_| DepinError::Message {
            reason: format!("public key is not valid hex: {s}"),
        })?;
        if bytes.len() != 33 && bytes.len() != 65 {
            return Err(DepinError::Message {
                reason: format!("public key has unexpected length {}", bytes.len()),
            });
        }
        Ok(Self(lower))
    }

    /// Returns the canonical lowercase hex form.
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// Decodes the key to raw bytes.
    ///
    /// Cannot fail for a `Pubkey` built through [`Pubkey::parse`].
    pub fn to_bytes(&self) -> Vec<u8> {
        hex::decode(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Pubkey {
    type Err = DepinError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// RecipientEntry
// ---------------------------------------------------------------------------

/// A token holder with a revealed public key.
///
/// Produced by the recipient directory from `list_depin_addresses`;
/// replaced atomically on every successful refresh.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecipientEntry {
    /// Holder address.
    pub address: Address,
    /// Revealed compressed public key.
    pub pubkey: Pubkey,
}

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// Classification of a decrypted message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Broadcast to every current token holder.
    Group,
    /// Addressed to a single holder.
    Private,
}

impl MessageKind {
    /// Parses the node's `message_type` field.
    ///
    /// Only the literal string `"private"` (case-insensitive) maps to
    /// [`MessageKind::Private`]; anything else, including absent and
    /// unknown values, falls back to [`MessageKind::Group`].
    pub fn from_record_type(value: Option<&str>) -> Self {
        match value {
            Some(s) if s.eq_ignore_ascii_case("private") => Self::Private,
            _ => Self::Group,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group => write!(f, "group"),
            Self::Private => write!(f, "private"),
        }
    }
}

// ---------------------------------------------------------------------------
// StoredMessage
// ---------------------------------------------------------------------------

/// A decrypted message held in the in-memory log.
///
/// Invariants maintained by the store:
/// - the pair `(hash, signature)` is unique within a run;
/// - the log is totally ordered by `(timestamp asc, hash asc)`;
/// - `peer` is `None` for [`MessageKind::Group`] and, when present for
///   a private message, never equals the local wallet address.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoredMessage {
    /// Node-assigned message hash (hex).
    pub hash: String,
    /// Sender signature over the envelope (raw bytes).
    pub signature: Vec<u8>,
    /// Sender address as reported by the node.
    pub sender: Address,
    /// UNIX seconds.
    pub timestamp: u64,
    /// Decrypted message text.
    pub plaintext: String,
    /// Group broadcast or private.
    pub kind: MessageKind,
    /// Conversation peer for private messages.
    pub peer: Option<Address>,
}

impl StoredMessage {
    /// Deduplication key: `"{hash}|{signature_hex}"`.
    pub fn dedup_key(&self) -> String {
        format!("{}|{}", self.hash, hex::encode(&self.signature))
    }
}

// ---------------------------------------------------------------------------
// MessageRecord
// ---------------------------------------------------------------------------

/// One encrypted record as returned by `msg_receive`.
///
/// Fields the client does not understand are dropped at decode time.
/// Records missing any of `hash`, `signature`, or `encrypted_payload`
/// are skipped by the poller.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MessageRecord {
    /// Node-assigned message hash.
    #[serde(default)]
    pub hash: Option<String>,
    /// Hex-encoded sender signature.
    #[serde(default, alias = "signature_hex")]
    pub signature: Option<String>,
    /// Hex-encoded encrypted envelope.
    #[serde(default, alias = "encrypted_payload_hex", alias = "message")]
    pub encrypted_payload: Option<String>,
    /// Sender address.
    #[serde(default)]
    pub sender: Option<String>,
    /// UNIX seconds.
    #[serde(default)]
    pub timestamp: Option<u64>,
    /// `"group"` or `"private"`; treated permissively.
    #[serde(default)]
    pub message_type: Option<String>,
}

// ---------------------------------------------------------------------------
// PoolInfo
// ---------------------------------------------------------------------------

/// Message-pool status from `msg_pool_info`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PoolInfo {
    /// Number of messages currently in the pool.
    #[serde(default)]
    pub messages: u64,
    /// Cipher identifier advertised by the node.
    #[serde(default)]
    pub cipher: Option<String>,
    /// Pool retention in hours, when the node reports it.
    #[serde(default, rename = "messageexpiryhours")]
    pub message_expiry_hours: Option<u64>,
    /// Pool public key for the server-side privacy layer.
    ///
    /// `"0"` (or absence) means the privacy layer is disabled.
    #[serde(default, rename = "depinpoolpkey")]
    pub pool_pubkey: Option<String>,
}

impl PoolInfo {
    /// Returns the pool public key when the privacy layer is active.
    pub fn active_pool_pubkey(&self) -> Option<&str> {
        match self.pool_pubkey.as_deref() {
            Some("0") | Some("") | None => None,
            Some(key) => Some(key),
        }
    }
}

// ---------------------------------------------------------------------------
// UiEvent
// ---------------------------------------------------------------------------

/// Events emitted by the engine to the UI adapter.
///
/// The adapter must be idempotent under duplicates.
#[derive(Clone, Debug)]
pub enum UiEvent {
    /// A new message entered the log.
    Message {
        hash: String,
        sender: Address,
        timestamp: u64,
        plaintext: String,
        kind: MessageKind,
        peer: Option<Address>,
    },
    /// A poll iteration finished.
    PollComplete {
        /// UNIX seconds at completion.
        date: u64,
        /// Messages added by this iteration.
        new_count: usize,
        /// Total messages in the log.
        total: usize,
        /// Best-effort pool status.
        pool_info: Option<PoolInfo>,
    },
    /// A poll iteration failed.
    PollError { message: String },
    /// Connectivity returned after an outage; history was resynced.
    Reconnected,
    /// One or more gating preconditions failed; polling is stopped.
    BlockingErrors {
        /// Human-readable causes, at most three.
        messages: Vec<String>,
        /// Seconds until the next verification attempt.
        retry_in_secs: u64,
    },
    /// All gating preconditions pass again.
    BlockingCleared,
}

// ---------------------------------------------------------------------------
// MessageCipher boundary
// ---------------------------------------------------------------------------

/// Inputs for building one encrypted envelope.
pub struct EnvelopeParams<'a> {
    /// Token gating the audience; bound into the envelope.
    pub token: &'a str,
    /// Local wallet address.
    pub sender_address: &'a Address,
    /// Local wallet public key (compressed hex).
    pub sender_pubkey: &'a Pubkey,
    /// Local signing key in WIF form.
    pub sender_private_key: &'a str,
    /// UNIX seconds at build time.
    pub timestamp: u64,
    /// Message text.
    pub message: &'a str,
    /// Every recipient the body key is wrapped for.
    pub recipient_pubkeys: &'a [Pubkey],
    /// Group broadcast or private.
    pub kind: MessageKind,
}

/// Output of a successful envelope build.
pub struct BuiltEnvelope {
    /// Full envelope, hex-encoded, ready for `msg_submit`.
    pub hex: String,
    /// Client-side hash of the envelope, used to match the message
    /// when it comes back on the next poll.
    pub message_hash: String,
}

/// The envelope cryptography boundary.
///
/// The engine never touches curve arithmetic directly; it drives this
/// trait. The production implementation lives in `depinchat-crypto`;
/// engine tests substitute a deterministic mock.
pub trait MessageCipher: Send + Sync {
    /// Builds, encrypts, and signs an envelope for the given
    /// recipients.
    fn build_envelope(&self, params: &EnvelopeParams<'_>) -> Result<BuiltEnvelope>;

    /// Decrypts an envelope addressed to the holder of
    /// `recipient_private_key`; fails when the ciphertext is not
    /// addressed to that key or is malformed.
    fn open_envelope(
        &self,
        encrypted_payload_hex: &str,
        recipient_private_key: &str,
    ) -> Result<String>;

    /// Wraps an already-built envelope for the pool's server-side
    /// privacy layer.
    fn wrap_for_pool(
        &self,
        payload_hex: &str,
        pool_pubkey_hex: &str,
        sender_address: &Address,
    ) -> Result<String>;

    /// Reverses the pool privacy layer; the returned string is the
    /// JSON the node would otherwise have sent in the clear.
    fn unwrap_from_pool(
        &self,
        encrypted_hex: &str,
        recipient_private_key: &str,
    ) -> Result<String>;
}

// ---------------------------------------------------------------------------
// DepinError
// ---------------------------------------------------------------------------

/// Central error type for the DepinChat client.
///
/// All crates in the workspace convert their internal errors into
/// variants of this enum. The supervisor pattern-matches on it to
/// decide between entering the blocked state and surfacing a status
/// line.
#[derive(Debug, Error)]
pub enum DepinError {
    /// The config file is missing, unreadable, or fails validation.
    #[error("config error: {reason}")]
    Config {
        /// Human-readable description of the configuration problem.
        reason: String,
    },

    /// The encrypted private-key record does not have the
    /// `salt:iv:tag:ct` shape.
    #[error("stored private key record is malformed")]
    MalformedSecret,

    /// Decryption of the private-key record failed.
    ///
    /// Deliberately covers every downstream failure (hex decode, key
    /// derivation, AEAD authentication) so the error never reveals
    /// which check rejected the password.
    #[error("wrong password")]
    BadPassword,

    /// The interactive unlock exhausted its allowed attempts.
    #[error("maximum password attempts exceeded")]
    MaxAttemptsExceeded,

    /// Any transport or JSON-RPC level failure.
    #[error("RPC error: {message}")]
    Rpc {
        /// Failure description, including the node's error message
        /// when one was returned.
        message: String,
    },

    /// The WIF private key cannot be decoded or keys derived from it.
    #[error("invalid WIF private key: {reason}")]
    InvalidWif { reason: String },

    /// No token holder has revealed a public key; nothing to send to.
    #[error("no recipients with revealed public keys")]
    NoRecipients,

    /// A private-message input did not match `@address message`.
    #[error("invalid private message format, expected '@address message'")]
    InvalidPrivateFormat,

    /// The requested peer holds the token but has not revealed a
    /// public key on-chain.
    #[error("recipient {address} has not revealed a public key")]
    RecipientPubkeyNotRevealed { address: Address },

    /// A cryptographic operation failed.
    #[error("crypto error: {reason}")]
    Crypto { reason: String },

    /// Any other messaging-layer failure.
    #[error("{reason}")]
    Message { reason: String },
}

impl DepinError {
    /// True when the failure indicates the node is unreachable, as
    /// opposed to a local or protocol-level problem.
    pub fn is_rpc(&self) -> bool {
        matches!(self, Self::Rpc { .. })
    }
}

/// Convenience result type using [`DepinError`].
pub type Result<T> = std::result::Result<T, DepinError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
