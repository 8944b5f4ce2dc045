//! The send pipeline.
//!
//! Parses user input (`@address message` for private, anything else
//! for group), resolves recipient keys through the directory, builds
//! and signs the envelope, wraps it for the pool privacy layer when
//! the node advertises one, and submits.

use std::sync::Arc;

use depinchat_rpc::NodeRpc;
use depinchat_types::{Address, DepinError, MessageKind, Result};

use crate::codec::EnvelopeCodec;
use crate::directory::RecipientDirectory;

/// Result of a successful send, reported back to the UI and used to
/// register the outgoing-private mapping.
#[derive(Clone, Debug)]
pub struct SendOutcome {
    /// Identifier returned by `msg_submit` (hash or txid).
    pub submit_id: String,
    /// Client-side envelope hash; keys the outgoing-private map.
    pub message_hash: String,
    /// Number of recipients the body key was wrapped for.
    pub recipients: usize,
    /// UNIX seconds at build time.
    pub timestamp: u64,
    pub kind: MessageKind,
    /// The peer for a private send.
    pub peer: Option<Address>,
}

/// Parsed user input.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParsedInput {
    Group { body: String },
    Private { peer: Address, body: String },
}

/// Parses raw input into a send target.
///
/// `@address message` is private; the address is everything up to the
/// first whitespace and the body must be non-empty. Anything not
/// starting with `@` is a group broadcast.
pub fn parse_input(raw: &str) -> Result<ParsedInput> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DepinError::Message {
            reason: "nothing to send".into(),
        });
    }

    let Some(rest) = trimmed.strip_prefix('@') else {
        return Ok(ParsedInput::Group {
            body: trimmed.to_owned(),
        });
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let peer = parts.next().unwrap_or_default();
    let body = parts.next().unwrap_or_default().trim();
    if peer.is_empty() || body.is_empty() {
        return Err(DepinError::InvalidPrivateFormat);
    }
    Ok(ParsedInput::Private {
        peer: Address::from(peer),
        body: body.to_owned(),
    })
}

/// The send pipeline.
pub struct Sender<R> {
    rpc: Arc<R>,
    codec: EnvelopeCodec,
}

impl<R: NodeRpc> Sender<R> {
    pub fn new(rpc: Arc<R>, codec: EnvelopeCodec) -> Self {
        Self { rpc, codec }
    }

    /// Sends one message. See the module docs for the pipeline.
    ///
    /// Any step's failure marks the connection down before the error
    /// is raised; the supervisor's next verification tick restores it.
    pub async fn send(
        &self,
        raw_input: &str,
        directory: &RecipientDirectory<R>,
    ) -> Result<SendOutcome> {
        match self.try_send(raw_input, directory).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.rpc.mark_disconnected();
                Err(e)
            }
        }
    }

    async fn try_send(
        &self,
        raw_input: &str,
        directory: &RecipientDirectory<R>,
    ) -> Result<SendOutcome> {
        // One silent reconnect attempt; beyond that the supervisor
        // owns recovery.
        if !self.rpc.is_connected() && !self.rpc.reconnect(true).await {
            return Err(DepinError::Rpc {
                message: "node RPC unavailable".into(),
            });
        }

        let parsed = parse_input(raw_input)?;
        let (kind, peer, body) = match &parsed {
            ParsedInput::Group { body } => (MessageKind::Group, None, body.as_str()),
            ParsedInput::Private { peer, body } => {
                (MessageKind::Private, Some(peer.clone()), body.as_str())
            }
        };

        let recipient_keys = match &peer {
            Some(address) => vec![directory.pubkey_for(address).await?],
            None => {
                let keys = directory.pubkeys().await?;
                if keys.is_empty() {
                    return Err(DepinError::NoRecipients);
                }
                keys
            }
        };
        let recipients = recipient_keys.len();

        let timestamp = crate::now_unix_secs();
        let built = self.codec.build(body, &recipient_keys, timestamp, kind)?;

        // Feature-detect the pool privacy layer. A failed probe is
        // downgraded: the envelope goes out unwrapped.
        let payload = match self.rpc.pool_info().await {
            Ok(info) => match info.active_pool_pubkey() {
                Some(pool_key) => self.codec.wrap_for_pool(&built.hex, pool_key)?,
                None => built.hex.clone(),
            },
            Err(e) => {
                tracing::debug!(%e, "pool info probe failed, submitting unwrapped");
                built.hex.clone()
            }
        };

        let submit_id = self.rpc.submit_message(&payload).await?;
        tracing::info!(%submit_id, recipients, %kind, "message submitted");

        Ok(SendOutcome {
            submit_id,
            message_hash: built.message_hash,
            recipients,
            timestamp,
            kind,
            peer,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_group() -> Result<()> {
        assert_eq!(
            parse_input("hello everyone")?,
            ParsedInput::Group {
                body: "hello everyone".into()
            }
        );
        Ok(())
    }

    #[test]
    fn leading_whitespace_is_trimmed() -> Result<()> {
        assert_eq!(
            parse_input("  hi  ")?,
            ParsedInput::Group { body: "hi".into() }
        );
        Ok(())
    }

    #[test]
    fn at_prefix_is_private() -> Result<()> {
        assert_eq!(
            parse_input("@Xpeer hello there")?,
            ParsedInput::Private {
                peer: Address::from("Xpeer"),
                body: "hello there".into(),
            }
        );
        Ok(())
    }

    #[test]
    fn private_body_is_trimmed() -> Result<()> {
        assert_eq!(
            parse_input("@Xpeer    spaced out   ")?,
            ParsedInput::Private {
                peer: Address::from("Xpeer"),
                body: "spaced out".into(),
            }
        );
        Ok(())
    }

    #[test]
    fn bare_at_is_invalid() {
        assert!(matches!(
            parse_input("@"),
            Err(DepinError::InvalidPrivateFormat)
        ));
        assert!(matches!(
            parse_input("@ hello"),
            Err(DepinError::InvalidPrivateFormat)
        ));
    }

    #[test]
    fn private_without_body_is_invalid() {
        assert!(matches!(
            parse_input("@Xpeer"),
            Err(DepinError::InvalidPrivateFormat)
        ));
        assert!(matches!(
            parse_input("@Xpeer   "),
            Err(DepinError::InvalidPrivateFormat)
        ));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(parse_input("").is_err());
        assert!(parse_input("   ").is_err());
    }

    #[test]
    fn message_containing_at_mid_text_is_group() -> Result<()> {
        assert_eq!(
            parse_input("mail me @ home")?,
            ParsedInput::Group {
                body: "mail me @ home".into()
            }
        );
        Ok(())
    }
}
