//! The engine task: one loop owning all mutable core state.
//!
//! [`Engine::run`] multiplexes with `tokio::select!`:
//!
//! 1. **Verification tick** — supervisor preconditions every 30 s
//!    (immediately at startup).
//! 2. **Poll tick** — one poll iteration at the configured interval,
//!    only while the supervisor reports `Running`.
//! 3. **Forced poll** — scheduled shortly after a send so the sent
//!    message shows up promptly.
//! 4. **Commands** — sends from the UI, with oneshot replies.
//! 5. **Shutdown** — a watch channel flipped by the CLI.
//!
//! All branches are non-blocking; state mutation happens only on
//! this task.

use std::sync::Arc;
use std::time::Duration;

use depinchat_rpc::NodeRpc;
use depinchat_types::{DepinError, MessageCipher, MessageKind, Result, UiEvent};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

use crate::codec::EnvelopeCodec;
use crate::directory::RecipientDirectory;
use crate::poller::Poller;
use crate::sender::{SendOutcome, Sender};
use crate::store::MessageStore;
use crate::supervisor::{Supervisor, SupervisorState, VerifyOutcome};
use crate::{Identity, FORCE_POLL_DELAY_MS, VERIFICATION_RETRY_MS};

/// Commands accepted by the engine task.
pub enum EngineCommand {
    /// Send one message; the outcome (or error) goes to `reply`.
    Send {
        input: String,
        reply: oneshot::Sender<Result<SendOutcome>>,
    },
    /// Trigger a poll outside the regular cadence.
    ForcePoll,
}

/// Cheap handle for driving the engine from the UI.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Sends a message and waits for the outcome.
    pub async fn send_message(&self, input: String) -> Result<SendOutcome> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(EngineCommand::Send { input, reply })
            .await
            .map_err(|_| DepinError::Message {
                reason: "engine is shutting down".into(),
            })?;
        rx.await.map_err(|_| DepinError::Message {
            reason: "engine dropped the send".into(),
        })?
    }

    /// Asks for an immediate poll.
    pub async fn force_poll(&self) {
        let _ = self.commands.send(EngineCommand::ForcePoll).await;
    }
}

/// Everything the engine needs at construction.
pub struct EngineSetup<R> {
    pub rpc: Arc<R>,
    pub cipher: Arc<dyn MessageCipher>,
    pub identity: Identity,
    pub token: String,
    pub poll_interval_ms: u64,
}

/// The engine task state. Built with [`Engine::new`], consumed by
/// [`Engine::run`].
pub struct Engine<R> {
    directory: RecipientDirectory<R>,
    store: MessageStore,
    poller: Poller<R>,
    sender: Sender<R>,
    supervisor: Supervisor<R>,
    commands: mpsc::Receiver<EngineCommand>,
    shutdown: watch::Receiver<bool>,
    poll_interval: Duration,
    force_poll_at: Option<Instant>,
}

impl<R: NodeRpc> Engine<R> {
    /// Wires up the engine. Returns the engine (to be run on its own
    /// task), the command handle, and the UI event stream.
    pub fn new(
        setup: EngineSetup<R>,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, EngineHandle, mpsc::UnboundedReceiver<UiEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(16);

        let codec = EnvelopeCodec::new(setup.cipher, setup.identity.clone(), setup.token.clone());
        let directory = RecipientDirectory::new(setup.rpc.clone(), setup.token.clone());
        let poller = Poller::new(setup.rpc.clone(), codec.clone(), event_tx.clone());
        let sender = Sender::new(setup.rpc.clone(), codec);
        let supervisor = Supervisor::new(
            setup.rpc,
            setup.token,
            setup.identity.address,
            event_tx,
        );

        let engine = Self {
            directory,
            store: MessageStore::new(),
            poller,
            sender,
            supervisor,
            commands: command_rx,
            shutdown,
            poll_interval: Duration::from_millis(setup.poll_interval_ms),
            force_poll_at: None,
        };
        let handle = EngineHandle {
            commands: command_tx,
        };
        (engine, handle, event_rx)
    }

    /// Runs until the shutdown watch flips.
    pub async fn run(mut self) {
        tracing::info!("engine starting");

        let mut verify_tick = interval(Duration::from_millis(VERIFICATION_RETRY_MS));
        verify_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut poll_tick = interval(self.poll_interval);
        poll_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // A pending forced poll, or effectively never.
            let forced_at = self
                .force_poll_at
                .unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400));

            tokio::select! {
                // -----------------------------------------------------------
                // 1. Supervisor verification.
                // -----------------------------------------------------------
                _ = verify_tick.tick() => {
                    self.handle_verify_tick().await;
                }

                // -----------------------------------------------------------
                // 2. Regular poll cadence.
                // -----------------------------------------------------------
                _ = poll_tick.tick() => {
                    if self.supervisor.state() == SupervisorState::Running {
                        self.run_poll(&mut verify_tick).await;
                    }
                }

                // -----------------------------------------------------------
                // 3. Forced poll after a send.
                // -----------------------------------------------------------
                _ = sleep_until(forced_at), if self.force_poll_at.is_some() => {
                    self.force_poll_at = None;
                    if self.supervisor.state() == SupervisorState::Running {
                        self.run_poll(&mut verify_tick).await;
                    }
                }

                // -----------------------------------------------------------
                // 4. Commands from the UI.
                // -----------------------------------------------------------
                command = self.commands.recv() => {
                    match command {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => {
                            tracing::info!("command channel closed, exiting");
                            break;
                        }
                    }
                }

                // -----------------------------------------------------------
                // 5. Shutdown.
                // -----------------------------------------------------------
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        tracing::info!("shutdown signal received, exiting");
                        break;
                    }
                }
            }
        }

        tracing::info!(messages = self.store.len(), "engine exited");
    }

    async fn handle_verify_tick(&mut self) {
        match self.supervisor.verify_tick().await {
            VerifyOutcome::Healthy { previous } => match previous {
                SupervisorState::Running => {}
                SupervisorState::Verifying => {
                    // Startup: bring the log up without waiting a full
                    // poll period.
                    self.force_poll_at = Some(Instant::now());
                }
                SupervisorState::Blocked => self.full_resync().await,
            },
            VerifyOutcome::Blocked { causes } => {
                tracing::warn!(?causes, "preconditions failed, polling stopped");
            }
        }
    }

    /// Recovery after an outage: fresh store, full-sync poll, forced
    /// directory refresh. The only moment history missed during the
    /// outage is replayed.
    async fn full_resync(&mut self) {
        tracing::info!("recovered, running full resync");
        self.store.clear();
        self.poller.mark_disconnected();
        if let Err(e) = self.directory.refresh(true).await {
            tracing::warn!(%e, "recipient refresh during resync failed");
        }
        self.force_poll_at = Some(Instant::now());
    }

    async fn run_poll(&mut self, verify_tick: &mut tokio::time::Interval) {
        if let Err(e) = self.poller.poll(&mut self.store, &self.directory).await {
            // The poller never retries on its own; align the blocked
            // countdown with the actual next verification attempt.
            self.supervisor.notify_rpc_down(&e);
            verify_tick.reset();
        }
    }

    async fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Send { input, reply } => {
                let result = self.sender.send(&input, &self.directory).await;
                if let Ok(outcome) = &result {
                    if outcome.kind == MessageKind::Private {
                        if let Some(peer) = &outcome.peer {
                            self.store
                                .register_outgoing_private(outcome.message_hash.as_str(), peer.clone());
                        }
                    }
                    self.force_poll_at =
                        Some(Instant::now() + Duration::from_millis(FORCE_POLL_DELAY_MS));
                }
                let _ = reply.send(result);
            }
            EngineCommand::ForcePoll => {
                self.force_poll_at = Some(Instant::now());
            }
        }
    }
}
