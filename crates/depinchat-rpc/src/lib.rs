//! Typed JSON-RPC client for the DepinChat node.
//!
//! The node speaks JSON-RPC over HTTP(S) at `<rpc_url>/rpc`. This
//! crate exposes the [`NodeRpc`] trait — one method per RPC the
//! client consumes — and [`HttpRpcClient`], the production
//! implementation. Engine tests substitute their own mock.
//!
//! The client tracks a single `connected` flag: every call flips it
//! to `true` on success and `false` on any failure, so the supervisor
//! and poller read one coherent signal instead of re-probing.

mod client;

use std::collections::HashMap;

use depinchat_types::{Address, MessageRecord, PoolInfo, Result};
use serde::Deserialize;

pub use client::HttpRpcClient;

// ---------------------------------------------------------------------------
// Response DTOs
// ---------------------------------------------------------------------------

/// One row of `list_depin_addresses`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DepinAddressEntry {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub pubkey: Option<String>,
}

/// Result of `get_pubkey`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PubkeyInfo {
    #[serde(default)]
    pub pubkey: Option<String>,
    /// `1` when the key is revealed on-chain.
    #[serde(default)]
    pub revealed: u8,
}

impl PubkeyInfo {
    pub fn is_revealed(&self) -> bool {
        self.revealed == 1
    }
}

/// Result of `msg_submit`: the node returns either `hash` or `txid`
/// depending on version.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SubmitResult {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub txid: Option<String>,
}

impl SubmitResult {
    /// The identifier under either name.
    pub fn id(&self) -> Option<&str> {
        self.hash.as_deref().or(self.txid.as_deref())
    }
}

/// Result of `msg_receive`.
///
/// With the pool privacy layer off the node returns the records in
/// the clear; with it on, a single `{encrypted: hex}` object the
/// caller must unwrap with its own key.
#[derive(Clone, Debug)]
pub enum ReceiveResult {
    Records(Vec<MessageRecord>),
    Encrypted(String),
}

impl ReceiveResult {
    /// Decodes the raw `result` member of an `msg_receive` response.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        #[derive(Deserialize)]
        struct EncryptedShape {
            encrypted: String,
        }
        if value.is_array() {
            let records: Vec<MessageRecord> =
                serde_json::from_value(value).map_err(|e| depinchat_types::DepinError::Rpc {
                    message: format!("malformed msg_receive records: {e}"),
                })?;
            return Ok(Self::Records(records));
        }
        let shape: EncryptedShape =
            serde_json::from_value(value).map_err(|e| depinchat_types::DepinError::Rpc {
                message: format!("malformed msg_receive response: {e}"),
            })?;
        Ok(Self::Encrypted(shape.encrypted))
    }
}

// ---------------------------------------------------------------------------
// NodeRpc
// ---------------------------------------------------------------------------

/// The RPC surface the engine consumes.
///
/// One method per node RPC, plus connection management. Kept as a
/// trait so engine tests can run against a scripted node.
#[allow(async_fn_in_trait)]
pub trait NodeRpc {
    /// Current view of the connection flag.
    fn is_connected(&self) -> bool;

    /// Forces the connection flag down without a round trip. The next
    /// probe or successful call raises it again.
    fn mark_disconnected(&self);

    /// `blockchain_info` — only liveness is consumed.
    async fn blockchain_info(&self) -> Result<serde_json::Value>;

    /// `msg_pool_info`.
    async fn pool_info(&self) -> Result<PoolInfo>;

    /// `msg_receive token address [since_ts]`.
    async fn receive_messages(
        &self,
        token: &str,
        address: &Address,
        since_ts: Option<u64>,
    ) -> Result<ReceiveResult>;

    /// `msg_submit payload_hex` → message hash (or txid).
    async fn submit_message(&self, payload_hex: &str) -> Result<String>;

    /// `list_depin_addresses token`.
    async fn list_depin_addresses(&self, token: &str) -> Result<Vec<DepinAddressEntry>>;

    /// `list_addresses_by_asset token` → address → balance.
    async fn list_addresses_by_asset(&self, token: &str) -> Result<HashMap<String, f64>>;

    /// `get_pubkey address`.
    async fn get_pubkey(&self, address: &Address) -> Result<PubkeyInfo>;

    /// Health probe via `blockchain_info`. Returns success; logs only
    /// when not `silent`.
    async fn test_connection(&self, silent: bool) -> bool;

    /// Probe and, on failure, rebuild the transport and probe again.
    /// Never errors.
    async fn reconnect(&self, silent: bool) -> bool;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_result_decodes_record_array() -> Result<()> {
        let value = serde_json::json!([
            {"hash": "h1", "signature": "aa", "encrypted_payload": "bb",
             "sender": "X1", "timestamp": 100, "message_type": "group"}
        ]);
        match ReceiveResult::from_value(value)? {
            ReceiveResult::Records(records) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].hash.as_deref(), Some("h1"));
            }
            ReceiveResult::Encrypted(_) => panic!("expected records"),
        }
        Ok(())
    }

    #[test]
    fn receive_result_decodes_encrypted_shape() -> Result<()> {
        let value = serde_json::json!({"encrypted": "deadbeef"});
        match ReceiveResult::from_value(value)? {
            ReceiveResult::Encrypted(hex) => assert_eq!(hex, "deadbeef"),
            ReceiveResult::Records(_) => panic!("expected encrypted"),
        }
        Ok(())
    }

    #[test]
    fn receive_result_rejects_other_shapes() {
        assert!(ReceiveResult::from_value(serde_json::json!(42)).is_err());
        assert!(ReceiveResult::from_value(serde_json::json!({"other": 1})).is_err());
    }

    #[test]
    fn empty_record_array_is_fine() -> Result<()> {
        match ReceiveResult::from_value(serde_json::json!([]))? {
            ReceiveResult::Records(records) => assert!(records.is_empty()),
            ReceiveResult::Encrypted(_) => panic!("expected records"),
        }
        Ok(())
    }

    #[test]
    fn submit_result_prefers_hash() {
        let both = SubmitResult {
            hash: Some("h".into()),
            txid: Some("t".into()),
        };
        assert_eq!(both.id(), Some("h"));
        let txid_only = SubmitResult {
            hash: None,
            txid: Some("t".into()),
        };
        assert_eq!(txid_only.id(), Some("t"));
    }

    #[test]
    fn pubkey_info_revealed_flag() {
        assert!(PubkeyInfo {
            pubkey: Some("02ab".into()),
            revealed: 1
        }
        .is_revealed());
        assert!(!PubkeyInfo::default().is_revealed());
    }
}
