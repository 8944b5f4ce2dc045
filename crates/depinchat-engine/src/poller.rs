//! The incremental polling loop.
//!
//! One iteration fetches new envelopes, optionally unwraps the pool
//! privacy layer, decrypts what is addressed to us, classifies each
//! message, inserts into the store, and emits events. Envelopes that
//! fail to decrypt are skipped silently — most pool traffic is not
//! addressed to this holder and that is not an error.
//!
//! The poller never reconnects; on any failure it reports and lets
//! the supervisor drive recovery. After a reconnection the supervisor
//! sets `was_disconnected`, which makes the next iteration a full
//! sync (no `since_ts`), replaying everything still in the pool.

use std::sync::Arc;

use depinchat_rpc::{NodeRpc, ReceiveResult};
use depinchat_types::{
    Address, DepinError, MessageKind, MessageRecord, Result, StoredMessage, UiEvent,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::codec::{extract_recipient_hashes, EnvelopeCodec};
use crate::directory::RecipientDirectory;
use crate::store::MessageStore;

/// What one call to [`Poller::poll`] did.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PollOutcome {
    /// The iteration ran; counts are in the emitted `PollComplete`.
    Completed { new_count: usize, total: usize },
    /// Another iteration was already in flight.
    Skipped,
}

/// Periodic fetch-decrypt-classify worker.
pub struct Poller<R> {
    rpc: Arc<R>,
    codec: EnvelopeCodec,
    events: UnboundedSender<UiEvent>,
    is_polling: bool,
    was_disconnected: bool,
}

impl<R: NodeRpc> Poller<R> {
    pub fn new(rpc: Arc<R>, codec: EnvelopeCodec, events: UnboundedSender<UiEvent>) -> Self {
        Self {
            rpc,
            codec,
            events,
            is_polling: false,
            // The first poll of a run is a full sync anyway: the
            // store is empty, so no `since_ts` is sent.
            was_disconnected: false,
        }
    }

    /// Forces the next iteration to replay the whole pool.
    pub fn mark_disconnected(&mut self) {
        self.was_disconnected = true;
    }

    /// One poll iteration. Non-reentrant: a call while another is in
    /// flight is a no-op.
    ///
    /// On failure the `PollError` event is already emitted; the `Err`
    /// return exists so the caller can notify the supervisor.
    pub async fn poll(
        &mut self,
        store: &mut MessageStore,
        directory: &RecipientDirectory<R>,
    ) -> Result<PollOutcome> {
        if self.is_polling {
            return Ok(PollOutcome::Skipped);
        }
        self.is_polling = true;
        let result = self.poll_inner(store, directory).await;
        self.is_polling = false;

        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.was_disconnected = true;
                let _ = self.events.send(UiEvent::PollError {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn poll_inner(
        &mut self,
        store: &mut MessageStore,
        directory: &RecipientDirectory<R>,
    ) -> Result<PollOutcome> {
        if !self.rpc.is_connected() {
            return Err(DepinError::Rpc {
                message: "node RPC unavailable".into(),
            });
        }

        let full_sync = self.was_disconnected;
        let since_ts = match store.last_timestamp() {
            ts if !full_sync && ts > 0 => Some(ts),
            _ => None,
        };

        let received = self
            .rpc
            .receive_messages(self.codec.token(), self.codec.self_address(), since_ts)
            .await?;

        let records = match received {
            ReceiveResult::Records(records) => records,
            ReceiveResult::Encrypted(hex) => {
                let json = self.codec.unwrap_from_pool(&hex)?;
                serde_json::from_str::<Vec<MessageRecord>>(&json).map_err(|e| {
                    DepinError::Message {
                        reason: format!("pool payload is not a record array: {e}"),
                    }
                })?
            }
        };

        let mut new_count = 0usize;
        for record in records {
            let Some(message) = self.decrypt_and_classify(&record, store, directory).await else {
                continue;
            };
            let event = UiEvent::Message {
                hash: message.hash.clone(),
                sender: message.sender.clone(),
                timestamp: message.timestamp,
                plaintext: message.plaintext.clone(),
                kind: message.kind,
                peer: message.peer.clone(),
            };
            if store.add(message) {
                new_count += 1;
                let _ = self.events.send(event);
            }
        }

        let pool_info = self.rpc.pool_info().await.ok();
        let total = store.len();
        let _ = self.events.send(UiEvent::PollComplete {
            date: crate::now_unix_secs(),
            new_count,
            total,
            pool_info,
        });

        if full_sync {
            self.was_disconnected = false;
            let _ = self.events.send(UiEvent::Reconnected);
        }

        Ok(PollOutcome::Completed { new_count, total })
    }

    /// Decrypts one record and resolves its classification. `None`
    /// means the record is skipped (not addressed to us, or missing
    /// required fields).
    async fn decrypt_and_classify(
        &self,
        record: &MessageRecord,
        store: &MessageStore,
        directory: &RecipientDirectory<R>,
    ) -> Option<StoredMessage> {
        let (Some(hash), Some(signature_hex), Some(payload_hex)) = (
            record.hash.as_deref(),
            record.signature.as_deref(),
            record.encrypted_payload.as_deref(),
        ) else {
            return None;
        };

        let plaintext = match self.codec.open(payload_hex) {
            Ok(text) => text,
            Err(_) => {
                tracing::trace!(%hash, "envelope not addressed to us, skipping");
                return None;
            }
        };

        let kind = MessageKind::from_record_type(record.message_type.as_deref());
        let sender = Address::new(record.sender.clone().unwrap_or_default());
        let self_address = self.codec.self_address();

        let peer = match kind {
            MessageKind::Group => None,
            MessageKind::Private => {
                let direct = if &sender == self_address {
                    store.lookup_outgoing_private(hash).cloned()
                } else {
                    Some(sender.clone())
                };
                match direct {
                    Some(peer) => Some(peer),
                    // Our own private message with no local mapping
                    // (for example after a restart): recover the peer
                    // from the envelope's recipient table.
                    None => self.peer_from_recipient_table(payload_hex, directory).await,
                }
            }
        };
        let peer = peer.filter(|p| p != self_address);

        let signature = hex::decode(signature_hex)
            .unwrap_or_else(|_| signature_hex.as_bytes().to_vec());

        Some(StoredMessage {
            hash: hash.to_owned(),
            signature,
            sender,
            timestamp: record.timestamp.unwrap_or(0),
            plaintext,
            kind,
            peer,
        })
    }

    async fn peer_from_recipient_table(
        &self,
        payload_hex: &str,
        directory: &RecipientDirectory<R>,
    ) -> Option<Address> {
        let hashes = extract_recipient_hashes(payload_hex);
        if hashes.is_empty() {
            return None;
        }
        let map = directory.hash_map().await.ok()?;
        let self_address = self.codec.self_address();
        hashes
            .iter()
            .filter_map(|h| map.get(h))
            .find(|addr| *addr != self_address)
            .cloned()
    }
}
