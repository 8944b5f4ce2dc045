//! End-to-end engine scenarios over a scripted node and a
//! deterministic cipher.
//!
//! The mock cipher produces envelopes in the real wire layout
//! (compact-size vectors, 20-byte `hash160` recipient table) so the
//! recipient-hash fallback path exercises the production parser; the
//! "encryption" itself is the identity function. The mock node keeps
//! an in-memory pool and records the `since_ts` of every
//! `msg_receive` call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use depinchat_crypto::hash::{hash160, sha256d};
use depinchat_crypto::wire::{write_compact_size, write_vector, Reader};
use depinchat_engine::codec::EnvelopeCodec;
use depinchat_engine::directory::RecipientDirectory;
use depinchat_engine::poller::{PollOutcome, Poller};
use depinchat_engine::sender::Sender;
use depinchat_engine::store::MessageStore;
use depinchat_engine::supervisor::{Supervisor, SupervisorState, VerifyOutcome};
use depinchat_engine::Identity;
use depinchat_rpc::{DepinAddressEntry, NodeRpc, PubkeyInfo, ReceiveResult};
use depinchat_types::{
    Address, BuiltEnvelope, DepinError, EnvelopeParams, MessageCipher, MessageKind, MessageRecord,
    PoolInfo, Pubkey, Result, UiEvent,
};
use tokio::sync::mpsc;

const TOKEN: &str = "CHAT_TOKEN";

// ---------------------------------------------------------------------------
// Test identities
// ---------------------------------------------------------------------------

/// Test identities use the convention `private_key == pubkey hex`, so
/// the mock cipher can derive "whose key is this" from the WIF alone.
fn identity(name: &str, fill: u8) -> Identity {
    let pubkey_hex = format!("02{}", hex::encode([fill; 32]));
    Identity {
        address: Address::from(name),
        pubkey: Pubkey::parse(&pubkey_hex).expect("valid pubkey"),
        private_key: pubkey_hex,
    }
}

// ---------------------------------------------------------------------------
// Mock cipher
// ---------------------------------------------------------------------------

/// Identity-function cipher over the real envelope wire layout.
struct MockCipher;

impl MessageCipher for MockCipher {
    fn build_envelope(&self, params: &EnvelopeParams<'_>) -> Result<BuiltEnvelope> {
        let mut bytes = Vec::new();
        write_vector(&mut bytes, &[0xEE; 33]); // ephemeral pubkey
        write_vector(&mut bytes, params.message.as_bytes()); // "encrypted" body
        write_compact_size(&mut bytes, params.recipient_pubkeys.len() as u64);
        for pubkey in params.recipient_pubkeys {
            let pk_bytes = pubkey.to_bytes();
            bytes.extend_from_slice(&hash160(&pk_bytes));
            // The "wrapped key" is the recipient pubkey itself, so
            // open_envelope can check addressing.
            write_vector(&mut bytes, &pk_bytes);
        }
        write_vector(&mut bytes, b"mock-signature");
        let message_hash = hex::encode(sha256d(&bytes));
        Ok(BuiltEnvelope {
            hex: hex::encode(bytes),
            message_hash,
        })
    }

    fn open_envelope(
        &self,
        encrypted_payload_hex: &str,
        recipient_private_key: &str,
    ) -> Result<String> {
        let bytes = hex::decode(encrypted_payload_hex).map_err(|_| DepinError::Crypto {
            reason: "not hex".into(),
        })?;
        let my_pubkey = hex::decode(recipient_private_key).map_err(|_| DepinError::Crypto {
            reason: "bad mock key".into(),
        })?;

        let mut reader = Reader::new(&bytes);
        reader.skip_vector()?;
        let body = reader.read_vector()?.to_vec();
        let count = reader.read_compact_size()?;
        for _ in 0..count {
            let _hash: [u8; 20] = reader.read_array()?;
            let wrapped = reader.read_vector()?;
            if wrapped == my_pubkey.as_slice() {
                return String::from_utf8(body).map_err(|_| DepinError::Crypto {
                    reason: "not utf-8".into(),
                });
            }
        }
        Err(DepinError::Crypto {
            reason: "not addressed to this key".into(),
        })
    }

    fn wrap_for_pool(
        &self,
        payload_hex: &str,
        pool_pubkey_hex: &str,
        _sender_address: &Address,
    ) -> Result<String> {
        Ok(format!("wrapped:{pool_pubkey_hex}:{payload_hex}"))
    }

    fn unwrap_from_pool(&self, encrypted_hex: &str, _recipient_private_key: &str) -> Result<String> {
        encrypted_hex
            .strip_prefix("enc:")
            .map(str::to_owned)
            .ok_or(DepinError::Crypto {
                reason: "not a pool blob".into(),
            })
    }
}

// ---------------------------------------------------------------------------
// Mock node
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct PoolRecord {
    hash: String,
    signature: String,
    payload: String,
    sender: String,
    timestamp: u64,
    message_type: &'static str,
}

impl PoolRecord {
    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "hash": self.hash,
            "signature": self.signature,
            "encrypted_payload": self.payload,
            "sender": self.sender,
            "timestamp": self.timestamp,
            "message_type": self.message_type,
        })
    }
}

#[derive(Default)]
struct MockNode {
    connected: AtomicBool,
    down: AtomicBool,
    records: Mutex<Vec<PoolRecord>>,
    submitted: Mutex<Vec<String>>,
    since_seen: Mutex<Vec<Option<u64>>>,
    holders: Mutex<Vec<(String, String)>>,
    balances: Mutex<HashMap<String, f64>>,
    revealed: Mutex<HashMap<String, bool>>,
    pool_pubkey: Mutex<Option<String>>,
    /// Seal `msg_receive` responses as the privacy layer would.
    encrypt_receive: AtomicBool,
}

impl MockNode {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn add_holder(&self, identity: &Identity, balance: f64) {
        self.holders.lock().unwrap().push((
            identity.address.as_str().to_owned(),
            identity.pubkey.as_hex().to_owned(),
        ));
        self.balances
            .lock()
            .unwrap()
            .insert(identity.address.as_str().to_owned(), balance);
        self.revealed
            .lock()
            .unwrap()
            .insert(identity.address.as_str().to_owned(), true);
    }

    fn push_record(&self, record: PoolRecord) {
        self.records.lock().unwrap().push(record);
    }

    fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn last_since(&self) -> Option<u64> {
        self.since_seen.lock().unwrap().last().copied().flatten()
    }

    fn check_up(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            self.connected.store(false, Ordering::SeqCst);
            return Err(DepinError::Rpc {
                message: "connection refused".into(),
            });
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl NodeRpc for MockNode {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn blockchain_info(&self) -> Result<serde_json::Value> {
        self.check_up()?;
        Ok(serde_json::json!({"chain": "xna"}))
    }

    async fn pool_info(&self) -> Result<PoolInfo> {
        self.check_up()?;
        Ok(PoolInfo {
            messages: self.records.lock().unwrap().len() as u64,
            cipher: Some("evp".into()),
            message_expiry_hours: Some(48),
            pool_pubkey: self.pool_pubkey.lock().unwrap().clone(),
        })
    }

    async fn receive_messages(
        &self,
        _token: &str,
        address: &Address,
        since_ts: Option<u64>,
    ) -> Result<ReceiveResult> {
        self.check_up()?;
        self.since_seen.lock().unwrap().push(since_ts);
        let _ = address; // the mock pool is not partitioned by address

        let records: Vec<serde_json::Value> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| since_ts.map_or(true, |ts| r.timestamp >= ts))
            .map(PoolRecord::to_json)
            .collect();

        if self.encrypt_receive.load(Ordering::SeqCst) {
            let json = serde_json::Value::Array(records).to_string();
            return Ok(ReceiveResult::Encrypted(format!("enc:{json}")));
        }
        let decoded: Vec<MessageRecord> =
            serde_json::from_value(serde_json::Value::Array(records)).expect("mock records decode");
        Ok(ReceiveResult::Records(decoded))
    }

    async fn submit_message(&self, payload_hex: &str) -> Result<String> {
        self.check_up()?;
        self.submitted.lock().unwrap().push(payload_hex.to_owned());
        Ok(format!("txid-{}", self.submitted.lock().unwrap().len()))
    }

    async fn list_depin_addresses(&self, _token: &str) -> Result<Vec<DepinAddressEntry>> {
        self.check_up()?;
        Ok(self
            .holders
            .lock()
            .unwrap()
            .iter()
            .map(|(address, pubkey)| DepinAddressEntry {
                address: Some(address.clone()),
                pubkey: Some(pubkey.clone()),
            })
            .collect())
    }

    async fn list_addresses_by_asset(&self, _token: &str) -> Result<HashMap<String, f64>> {
        self.check_up()?;
        Ok(self.balances.lock().unwrap().clone())
    }

    async fn get_pubkey(&self, address: &Address) -> Result<PubkeyInfo> {
        self.check_up()?;
        let revealed = self
            .revealed
            .lock()
            .unwrap()
            .get(address.as_str())
            .copied()
            .unwrap_or(false);
        Ok(PubkeyInfo {
            pubkey: None,
            revealed: u8::from(revealed),
        })
    }

    async fn test_connection(&self, _silent: bool) -> bool {
        self.blockchain_info().await.is_ok()
    }

    async fn reconnect(&self, silent: bool) -> bool {
        self.test_connection(silent).await
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    node: Arc<MockNode>,
    directory: RecipientDirectory<MockNode>,
    poller: Poller<MockNode>,
    sender: Sender<MockNode>,
    store: MessageStore,
    events: mpsc::UnboundedReceiver<UiEvent>,
    self_identity: Identity,
}

impl Harness {
    fn new(self_identity: Identity, others: &[&Identity]) -> Self {
        let node = MockNode::new();
        node.add_holder(&self_identity, 1.0);
        for other in others {
            node.add_holder(other, 1.0);
        }
        // The engine only polls once the supervisor verified the
        // connection; mirror that starting state.
        node.connected.store(true, Ordering::SeqCst);

        let (event_tx, events) = mpsc::unbounded_channel();
        let codec = EnvelopeCodec::new(
            Arc::new(MockCipher),
            self_identity.clone(),
            TOKEN.to_owned(),
        );
        let directory = RecipientDirectory::new(node.clone(), TOKEN.to_owned());
        let poller = Poller::new(node.clone(), codec.clone(), event_tx);
        let sender = Sender::new(node.clone(), codec);

        Self {
            node,
            directory,
            poller,
            sender,
            store: MessageStore::new(),
            events,
            self_identity,
        }
    }

    async fn poll(&mut self) -> Result<PollOutcome> {
        self.poller.poll(&mut self.store, &self.directory).await
    }

    async fn send(&self, input: &str) -> Result<depinchat_engine::sender::SendOutcome> {
        self.sender.send(input, &self.directory).await
    }

    /// Publishes a submitted envelope into the mock pool, as the node
    /// would after accepting `msg_submit`.
    fn publish(&self, outcome: &depinchat_engine::sender::SendOutcome, message_type: &'static str) {
        let submitted = self.node.submitted.lock().unwrap().last().cloned().unwrap();
        // Strip the pool wrapper the way the node would.
        let payload = submitted
            .rsplit_once(':')
            .filter(|_| submitted.starts_with("wrapped:"))
            .map(|(_, payload)| payload.to_owned())
            .unwrap_or(submitted);
        self.node.push_record(PoolRecord {
            hash: outcome.message_hash.clone(),
            signature: "aabb".into(),
            payload,
            sender: self.self_identity.address.as_str().to_owned(),
            timestamp: outcome.timestamp,
            message_type,
        });
    }

    fn drain_events(&mut self) -> Vec<UiEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

fn group_record(from: &Identity, to: &[&Identity], text: &str, ts: u64, hash: &str) -> PoolRecord {
    let cipher = MockCipher;
    let recipients: Vec<Pubkey> = to.iter().map(|i| i.pubkey.clone()).collect();
    let built = cipher
        .build_envelope(&EnvelopeParams {
            token: TOKEN,
            sender_address: &from.address,
            sender_pubkey: &from.pubkey,
            sender_private_key: &from.private_key,
            timestamp: ts,
            message: text,
            recipient_pubkeys: &recipients,
            kind: MessageKind::Group,
        })
        .expect("mock build");
    PoolRecord {
        hash: hash.to_owned(),
        signature: format!("{:02x}{:02x}", ts as u8, hash.len() as u8),
        payload: built.hex,
        sender: from.address.as_str().to_owned(),
        timestamp: ts,
        message_type: "group",
    }
}

// ---------------------------------------------------------------------------
// Scenario 1: group broadcast round-trip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn group_broadcast_round_trip() -> Result<()> {
    let alice = identity("Xalice", 0xA1);
    let bob = identity("Xbob", 0xB1);
    let mut h = Harness::new(alice.clone(), &[&bob]);

    let outcome = h.send("hello").await?;
    assert_eq!(outcome.recipients, 2);
    assert_eq!(outcome.kind, MessageKind::Group);
    assert!(outcome.peer.is_none());

    // The envelope's recipient table addresses both holders.
    let submitted = h.node.submitted.lock().unwrap().last().cloned().unwrap();
    let hashes = depinchat_engine::codec::extract_recipient_hashes(&submitted);
    assert_eq!(hashes.len(), 2);

    h.publish(&outcome, "group");
    h.poll().await?;

    assert_eq!(h.store.len(), 1);
    let msg = &h.store.messages()[0];
    assert_eq!(msg.sender, alice.address);
    assert_eq!(msg.plaintext, "hello");
    assert_eq!(msg.kind, MessageKind::Group);
    assert!(msg.peer.is_none());
    Ok(())
}

// ---------------------------------------------------------------------------
// Scenario 2: private outgoing classified via the outgoing map
// ---------------------------------------------------------------------------

#[tokio::test]
async fn private_outgoing_classified_via_map() -> Result<()> {
    let alice = identity("Xalice", 0xA1);
    let bob = identity("Xbob", 0xB1);
    let mut h = Harness::new(alice.clone(), &[&bob]);

    let outcome = h.send("@Xbob hi").await?;
    assert_eq!(outcome.kind, MessageKind::Private);
    assert_eq!(outcome.recipients, 1);
    assert_eq!(outcome.peer, Some(bob.address.clone()));

    // The engine registers the mapping after a private send.
    h.store
        .register_outgoing_private(outcome.message_hash.as_str(), bob.address.clone());
    assert_eq!(
        h.store.lookup_outgoing_private(&outcome.message_hash),
        Some(&bob.address)
    );

    h.publish(&outcome, "private");
    h.poll().await?;

    let msg = &h.store.messages()[0];
    assert_eq!(msg.sender, alice.address);
    assert_eq!(msg.kind, MessageKind::Private);
    assert_eq!(msg.peer, Some(bob.address));
    Ok(())
}

// ---------------------------------------------------------------------------
// Scenario 3: private outgoing classified via the hash fallback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn private_outgoing_classified_via_hash_fallback() -> Result<()> {
    let alice = identity("Xalice", 0xA1);
    let bob = identity("Xbob", 0xB1);
    let mut h = Harness::new(alice.clone(), &[&bob]);

    let outcome = h.send("@Xbob hi").await?;
    h.publish(&outcome, "private");

    // Restart: the outgoing map is gone.
    h.store.clear();

    h.poll().await?;
    let msg = &h.store.messages()[0];
    assert_eq!(msg.kind, MessageKind::Private);
    assert_eq!(
        msg.peer,
        Some(bob.address),
        "peer must come from the envelope's recipient table"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Scenario 4: incremental poll with since_ts and dedup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn incremental_poll_sends_since_and_dedups() -> Result<()> {
    let alice = identity("Xalice", 0xA1);
    let bob = identity("Xbob", 0xB1);
    let mut h = Harness::new(alice.clone(), &[&bob]);

    h.node
        .push_record(group_record(&bob, &[&alice, &bob], "first", 100, "h100"));
    h.node
        .push_record(group_record(&bob, &[&alice, &bob], "second", 105, "h105"));

    // First poll: full fetch, no since parameter.
    h.poll().await?;
    assert_eq!(h.node.last_since(), None);
    assert_eq!(h.store.len(), 2);
    assert_eq!(h.store.last_timestamp(), 105);

    // Second poll: must pass since_ts = 105; the node re-serves the
    // ts=105 record, which dedup suppresses.
    h.drain_events();
    let outcome = h.poll().await?;
    assert_eq!(h.node.last_since(), Some(105));
    assert_eq!(outcome, PollOutcome::Completed { new_count: 0, total: 2 });
    let events = h.drain_events();
    assert!(
        !events.iter().any(|e| matches!(e, UiEvent::Message { .. })),
        "duplicate records must not re-emit"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Scenario 5: reconnection full sync
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconnection_replays_the_pool() -> Result<()> {
    let alice = identity("Xalice", 0xA1);
    let bob = identity("Xbob", 0xB1);
    let mut h = Harness::new(alice.clone(), &[&bob]);

    h.node
        .push_record(group_record(&bob, &[&alice, &bob], "old", 500, "h500"));
    h.poll().await?;
    assert_eq!(h.store.last_timestamp(), 500);
    let total_before = h.store.len();

    // Outage: the poll fails and reports.
    h.node.set_down(true);
    assert!(h.poll().await.is_err());
    let events = h.drain_events();
    assert!(events.iter().any(|e| matches!(e, UiEvent::PollError { .. })));

    // While we were away another message landed in the pool.
    h.node
        .push_record(group_record(&bob, &[&alice, &bob], "missed", 600, "h600"));

    // Recovery, as the engine drives it: fresh store + full sync.
    h.node.set_down(false);
    h.node.connected.store(true, Ordering::SeqCst);
    h.store.clear();
    h.poller.mark_disconnected();

    h.poll().await?;
    // No since parameter on the full sync; everything replays.
    assert_eq!(h.node.last_since(), None);
    assert!(h.store.len() >= total_before);
    assert_eq!(h.store.len(), 2);
    let events = h.drain_events();
    assert!(events.iter().any(|e| matches!(e, UiEvent::Reconnected)));
    Ok(())
}

// ---------------------------------------------------------------------------
// Scenario 6: pool privacy layer auto-detect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pool_privacy_layer_auto_detect() -> Result<()> {
    let alice = identity("Xalice", 0xA1);
    let bob = identity("Xbob", 0xB1);
    let mut h = Harness::new(alice.clone(), &[&bob]);

    // depinpoolpkey = "0": submit the raw envelope hex.
    *h.node.pool_pubkey.lock().unwrap() = Some("0".into());
    h.send("in the clear").await?;
    let raw = h.node.submitted.lock().unwrap().last().cloned().unwrap();
    assert!(!raw.starts_with("wrapped:"));

    // depinpoolpkey = <hex>: submit wrapped for the pool key.
    *h.node.pool_pubkey.lock().unwrap() = Some("02poolkey".into());
    h.send("under wraps").await?;
    let wrapped = h.node.submitted.lock().unwrap().last().cloned().unwrap();
    assert!(wrapped.starts_with("wrapped:02poolkey:"));

    // An {encrypted: …} receive is transparently unwrapped before
    // classification.
    h.node
        .push_record(group_record(&bob, &[&alice, &bob], "sealed delivery", 700, "h700"));
    h.node.encrypt_receive.store(true, Ordering::SeqCst);
    h.poll().await?;
    assert_eq!(h.store.len(), 1);
    assert_eq!(h.store.messages()[0].plaintext, "sealed delivery");
    Ok(())
}

// ---------------------------------------------------------------------------
// Messages not addressed to us are skipped silently
// ---------------------------------------------------------------------------

#[tokio::test]
async fn foreign_envelopes_are_skipped() -> Result<()> {
    let alice = identity("Xalice", 0xA1);
    let bob = identity("Xbob", 0xB1);
    let carol = identity("Xcarol", 0xC1);
    let mut h = Harness::new(alice.clone(), &[&bob]);

    // Bob → Carol, not addressed to Alice.
    h.node
        .push_record(group_record(&bob, &[&carol], "not for alice", 100, "hx"));
    let outcome = h.poll().await?;
    assert_eq!(outcome, PollOutcome::Completed { new_count: 0, total: 0 });
    let events = h.drain_events();
    assert!(!events.iter().any(|e| matches!(e, UiEvent::PollError { .. })));
    Ok(())
}

// ---------------------------------------------------------------------------
// Supervisor gating
// ---------------------------------------------------------------------------

fn supervisor_for(h: &Harness) -> (Supervisor<MockNode>, mpsc::UnboundedReceiver<UiEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Supervisor::new(
            h.node.clone(),
            TOKEN.to_owned(),
            h.self_identity.address.clone(),
            tx,
        ),
        rx,
    )
}

#[tokio::test]
async fn supervisor_passes_when_all_preconditions_hold() -> Result<()> {
    let alice = identity("Xalice", 0xA1);
    let h = Harness::new(alice, &[]);
    let (mut supervisor, _events) = supervisor_for(&h);

    assert_eq!(supervisor.state(), SupervisorState::Verifying);
    let outcome = supervisor.verify_tick().await;
    assert_eq!(
        outcome,
        VerifyOutcome::Healthy {
            previous: SupervisorState::Verifying
        }
    );
    assert_eq!(supervisor.state(), SupervisorState::Running);
    Ok(())
}

#[tokio::test]
async fn supervisor_blocks_without_token() -> Result<()> {
    let alice = identity("Xalice", 0xA1);
    let h = Harness::new(alice.clone(), &[]);
    h.node
        .balances
        .lock()
        .unwrap()
        .insert(alice.address.as_str().to_owned(), 0.0);
    let (mut supervisor, mut events) = supervisor_for(&h);

    let outcome = supervisor.verify_tick().await;
    let VerifyOutcome::Blocked { causes } = outcome else {
        panic!("expected blocked");
    };
    assert!(causes.iter().any(|c| c.contains("does not hold token")));
    assert_eq!(supervisor.state(), SupervisorState::Blocked);

    let event = events.try_recv().expect("blocking event");
    assert!(matches!(
        event,
        UiEvent::BlockingErrors { retry_in_secs: 30, .. }
    ));
    Ok(())
}

#[tokio::test]
async fn supervisor_blocks_without_revealed_pubkey() -> Result<()> {
    let alice = identity("Xalice", 0xA1);
    let h = Harness::new(alice.clone(), &[]);
    h.node
        .revealed
        .lock()
        .unwrap()
        .insert(alice.address.as_str().to_owned(), false);
    let (mut supervisor, _events) = supervisor_for(&h);

    let VerifyOutcome::Blocked { causes } = supervisor.verify_tick().await else {
        panic!("expected blocked");
    };
    assert!(causes.iter().any(|c| c.contains("not revealed")));
    Ok(())
}

#[tokio::test]
async fn supervisor_aggregates_multiple_causes() -> Result<()> {
    let alice = identity("Xalice", 0xA1);
    let h = Harness::new(alice.clone(), &[]);
    h.node
        .balances
        .lock()
        .unwrap()
        .insert(alice.address.as_str().to_owned(), 0.0);
    h.node
        .revealed
        .lock()
        .unwrap()
        .insert(alice.address.as_str().to_owned(), false);
    let (mut supervisor, _events) = supervisor_for(&h);

    let VerifyOutcome::Blocked { causes } = supervisor.verify_tick().await else {
        panic!("expected blocked");
    };
    assert_eq!(causes.len(), 2);
    Ok(())
}

#[tokio::test]
async fn supervisor_recovery_reports_previous_blocked() -> Result<()> {
    let alice = identity("Xalice", 0xA1);
    let h = Harness::new(alice.clone(), &[]);
    let (mut supervisor, mut events) = supervisor_for(&h);

    h.node.set_down(true);
    let VerifyOutcome::Blocked { causes } = supervisor.verify_tick().await else {
        panic!("expected blocked");
    };
    assert!(causes[0].contains("unreachable"));

    h.node.set_down(false);
    let outcome = supervisor.verify_tick().await;
    assert_eq!(
        outcome,
        VerifyOutcome::Healthy {
            previous: SupervisorState::Blocked
        }
    );

    let collected: Vec<UiEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert!(collected
        .iter()
        .any(|e| matches!(e, UiEvent::BlockingCleared)));
    Ok(())
}

#[tokio::test]
async fn notify_rpc_down_enters_blocked() -> Result<()> {
    let alice = identity("Xalice", 0xA1);
    let h = Harness::new(alice, &[]);
    let (mut supervisor, mut events) = supervisor_for(&h);

    supervisor.verify_tick().await;
    assert_eq!(supervisor.state(), SupervisorState::Running);

    supervisor.notify_rpc_down(&DepinError::Rpc {
        message: "boom".into(),
    });
    assert_eq!(supervisor.state(), SupervisorState::Blocked);
    let collected: Vec<UiEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert!(collected
        .iter()
        .any(|e| matches!(e, UiEvent::BlockingErrors { .. })));
    Ok(())
}

// ---------------------------------------------------------------------------
// Sender edge cases
// ---------------------------------------------------------------------------

#[tokio::test]
async fn private_send_to_unrevealed_peer_fails() -> Result<()> {
    let alice = identity("Xalice", 0xA1);
    let h = Harness::new(alice, &[]);

    let result = h.send("@Xnobody hi").await;
    assert!(matches!(
        result,
        Err(DepinError::RecipientPubkeyNotRevealed { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn any_send_failure_marks_the_connection_down() -> Result<()> {
    let alice = identity("Xalice", 0xA1);
    let bob = identity("Xbob", 0xB1);
    let h = Harness::new(alice, &[&bob]);

    // A parse failure never reaches the transport, but still drops
    // the flag.
    assert!(h.node.is_connected());
    let result = h.send("@").await;
    assert!(matches!(result, Err(DepinError::InvalidPrivateFormat)));
    assert!(!h.node.is_connected());

    // The next send silently reconnects and succeeds.
    h.send("back online").await?;
    assert!(h.node.is_connected());

    // A recipient-resolution failure drops it too.
    let result = h.send("@Xnobody hi").await;
    assert!(matches!(
        result,
        Err(DepinError::RecipientPubkeyNotRevealed { .. })
    ));
    assert!(!h.node.is_connected());
    Ok(())
}

#[tokio::test]
async fn send_while_down_fails_with_rpc_error() -> Result<()> {
    let alice = identity("Xalice", 0xA1);
    let h = Harness::new(alice, &[]);
    h.node.set_down(true);
    h.node.connected.store(false, Ordering::SeqCst);

    let result = h.send("hello").await;
    assert!(matches!(result, Err(DepinError::Rpc { .. })));
    Ok(())
}

#[tokio::test]
async fn poll_while_disconnected_reports_and_flags_full_sync() -> Result<()> {
    let alice = identity("Xalice", 0xA1);
    let bob = identity("Xbob", 0xB1);
    let mut h = Harness::new(alice.clone(), &[&bob]);

    h.node.connected.store(false, Ordering::SeqCst);
    assert!(h.poll().await.is_err());

    // Once back up, the next poll omits since_ts even though the
    // store had seen messages.
    h.node.connected.store(true, Ordering::SeqCst);
    h.node
        .push_record(group_record(&bob, &[&alice, &bob], "hi", 100, "h1"));
    h.poll().await?;
    assert_eq!(h.node.last_since(), None);
    Ok(())
}
