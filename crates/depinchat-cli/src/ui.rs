//! The UI adapter: engine events in, terminal lines out.
//!
//! Bridges the engine's event bus to the rendering surface and the
//! stdin line reader to the sender. Idempotent under duplicate
//! events: message hashes already rendered are dropped.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, Utc};
use colored::Colorize;
use depinchat_engine::engine::EngineHandle;
use depinchat_types::config::Timezone;
use depinchat_types::{Address, MessageKind, UiEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

/// Renders engine events and drives the input loop.
pub struct UiAdapter {
    self_address: Address,
    timezone: Timezone,
    rendered: HashSet<String>,
    blocked: bool,
}

impl UiAdapter {
    pub fn new(self_address: Address, timezone: Timezone) -> Self {
        Self {
            self_address,
            timezone,
            rendered: HashSet::new(),
            blocked: false,
        }
    }

    /// Runs until the event stream closes or shutdown flips.
    ///
    /// Multiplexes engine events, stdin lines, and shutdown on one
    /// task so all terminal writes are serialized here.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<UiEvent>,
        handle: EngineHandle,
        shutdown_tx: watch::Sender<bool>,
    ) {
        let mut shutdown_rx = shutdown_tx.subscribe();
        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();

        println!(
            "{} Type a message to broadcast, {} for a private message, {} to exit.",
            "Ready.".bold().green(),
            "@address text".bold(),
            "/quit".bold()
        );

        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(event) => self.render(event),
                        None => break,
                    }
                }

                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if !self.handle_input(line.trim(), &handle, &shutdown_tx).await {
                                break;
                            }
                        }
                        // EOF or a broken stdin both end the session.
                        Ok(None) | Err(_) => {
                            let _ = shutdown_tx.send(true);
                            break;
                        }
                    }
                }

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// Returns `false` when the session should end.
    async fn handle_input(
        &mut self,
        line: &str,
        handle: &EngineHandle,
        shutdown_tx: &watch::Sender<bool>,
    ) -> bool {
        if line.is_empty() {
            return true;
        }
        if line == "/quit" || line == "/exit" {
            let _ = shutdown_tx.send(true);
            return false;
        }
        if self.blocked {
            self.status_line(&"cannot send while the node checks fail".yellow().to_string());
            return true;
        }

        match handle.send_message(line.to_owned()).await {
            Ok(outcome) => {
                let target = match &outcome.peer {
                    Some(peer) => format!("to {peer}"),
                    None => format!("to {} holder(s)", outcome.recipients),
                };
                self.status_line(&format!(
                    "sent {} ({})",
                    short_hash(&outcome.submit_id).dimmed(),
                    target
                ));
            }
            Err(e) => self.status_line(&format!("{} {e}", "send failed:".red())),
        }
        true
    }

    fn render(&mut self, event: UiEvent) {
        match event {
            UiEvent::Message {
                hash,
                sender,
                timestamp,
                plaintext,
                kind,
                peer,
            } => {
                // Duplicate events must render once.
                if !self.rendered.insert(hash) {
                    return;
                }
                self.render_message(&sender, timestamp, &plaintext, kind, peer.as_ref());
            }

            UiEvent::PollComplete {
                new_count,
                total,
                pool_info,
                ..
            } => {
                if new_count > 0 {
                    let expiry = pool_info
                        .as_ref()
                        .and_then(|p| p.message_expiry_hours)
                        .map(|h| format!(", pool keeps {h}h"))
                        .unwrap_or_default();
                    self.status_line(
                        &format!("{new_count} new, {total} total{expiry}").dimmed().to_string(),
                    );
                }
            }

            UiEvent::PollError { message } => {
                self.status_line(&format!("{} {message}", "poll failed:".red()));
            }

            UiEvent::Reconnected => {
                self.status_line(&"reconnected, history resynced".green().to_string());
            }

            UiEvent::BlockingErrors {
                messages,
                retry_in_secs,
            } => {
                self.blocked = true;
                println!();
                println!("{}", "── waiting for the node ──".yellow().bold());
                for cause in &messages {
                    println!("  {} {cause}", "✗".red());
                }
                println!("  retrying in {retry_in_secs}s");
            }

            UiEvent::BlockingCleared => {
                self.blocked = false;
                self.status_line(&"node checks pass".green().to_string());
            }
        }
    }

    fn render_message(
        &self,
        sender: &Address,
        timestamp: u64,
        plaintext: &str,
        kind: MessageKind,
        peer: Option<&Address>,
    ) {
        let time = self.format_time(timestamp);
        let own = sender == &self.self_address;
        let who = if own {
            "you".bold().cyan().to_string()
        } else {
            short_addr(sender).bold().to_string()
        };

        match kind {
            MessageKind::Group => {
                println!("{} {} {}", time.dimmed(), who, plaintext);
            }
            MessageKind::Private => {
                let tag = match (own, peer) {
                    (true, Some(peer)) => format!("→ {} (private)", short_addr(peer)),
                    (false, _) => "(private)".to_owned(),
                    (true, None) => "→ ? (private)".to_owned(),
                };
                println!(
                    "{} {} {} {}",
                    time.dimmed(),
                    who,
                    tag.magenta(),
                    plaintext
                );
            }
        }
    }

    fn format_time(&self, timestamp: u64) -> String {
        let utc: DateTime<Utc> =
            DateTime::from_timestamp(timestamp as i64, 0).unwrap_or(DateTime::UNIX_EPOCH);
        match FixedOffset::east_opt(self.timezone.offset_secs()) {
            Some(offset) => utc.with_timezone(&offset).format("%H:%M:%S").to_string(),
            None => utc.format("%H:%M:%S").to_string(),
        }
    }

    fn status_line(&self, text: &str) {
        eprintln!("{} {text}", "·".dimmed());
    }
}

fn short_addr(address: &Address) -> String {
    let s = address.as_str();
    if s.len() > 12 {
        format!("{}…{}", &s[..6], &s[s.len() - 4..])
    } else {
        s.to_owned()
    }
}

fn short_hash(hash: &str) -> String {
    if hash.len() > 10 {
        format!("{}…", &hash[..10])
    } else {
        hash.to_owned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
