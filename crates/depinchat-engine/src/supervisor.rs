//! The reconnection and verification supervisor.
//!
//! Owns the only retry timer in the system. Three preconditions gate
//! polling: the RPC answers, the wallet holds the token, and the
//! wallet's public key is revealed on-chain. Any failure collapses
//! into one user-visible blocked state with a single 30-second
//! countdown; recovery triggers a full resync driven by the engine
//! loop.

use std::sync::Arc;

use depinchat_rpc::NodeRpc;
use depinchat_types::{Address, UiEvent};
use tokio::sync::mpsc::UnboundedSender;

use crate::VERIFICATION_RETRY_MS;

/// At most this many causes are surfaced per blocked transition.
const MAX_BLOCKING_CAUSES: usize = 3;

/// Supervisor lifecycle state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SupervisorState {
    /// Startup: preconditions not yet confirmed.
    Verifying,
    /// All preconditions pass; the poller runs.
    Running,
    /// At least one precondition fails; the poller is stopped.
    Blocked,
}

/// What a verification tick decided, including where it came from so
/// the engine can distinguish recovery from a routine pass.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VerifyOutcome {
    /// Preconditions pass. `previous` tells the engine whether this
    /// is startup (`Verifying`), recovery (`Blocked`), or routine
    /// (`Running`).
    Healthy { previous: SupervisorState },
    /// Preconditions fail; the causes were emitted to the UI.
    Blocked { causes: Vec<String> },
}

/// Precondition gatekeeper.
pub struct Supervisor<R> {
    rpc: Arc<R>,
    token: String,
    self_address: Address,
    state: SupervisorState,
    events: UnboundedSender<UiEvent>,
}

impl<R: NodeRpc> Supervisor<R> {
    pub fn new(
        rpc: Arc<R>,
        token: String,
        self_address: Address,
        events: UnboundedSender<UiEvent>,
    ) -> Self {
        Self {
            rpc,
            token,
            self_address,
            state: SupervisorState::Verifying,
            events,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// One verification tick: probe, check, transition, emit.
    pub async fn verify_tick(&mut self) -> VerifyOutcome {
        let causes = self.check_preconditions().await;
        let previous = self.state;

        if causes.is_empty() {
            self.state = SupervisorState::Running;
            if previous == SupervisorState::Blocked {
                let _ = self.events.send(UiEvent::BlockingCleared);
                tracing::info!("preconditions restored, resuming");
            }
            return VerifyOutcome::Healthy { previous };
        }

        self.enter_blocked(causes.clone());
        VerifyOutcome::Blocked { causes }
    }

    /// Called from the poller's error path: stop polling, show the
    /// blocked panel, and restart the countdown so the on-screen
    /// timer matches the actual next retry.
    pub fn notify_rpc_down(&mut self, error: &depinchat_types::DepinError) {
        tracing::warn!(%error, "poller reported the node down");
        self.enter_blocked(vec![error.to_string()]);
    }

    fn enter_blocked(&mut self, mut causes: Vec<String>) {
        causes.truncate(MAX_BLOCKING_CAUSES);
        self.state = SupervisorState::Blocked;
        let _ = self.events.send(UiEvent::BlockingErrors {
            messages: causes,
            retry_in_secs: VERIFICATION_RETRY_MS / 1_000,
        });
    }

    /// Runs the three gating checks, aggregating human-readable
    /// failure causes.
    async fn check_preconditions(&self) -> Vec<String> {
        // 1. RPC reachable. Reconnect when the flag is down, plain
        //    probe otherwise. Without a connection the other checks
        //    cannot run at all.
        let up = if self.rpc.is_connected() {
            self.rpc.test_connection(true).await
        } else {
            self.rpc.reconnect(true).await
        };
        if !up {
            return vec!["node RPC is unreachable".to_owned()];
        }

        let mut causes = Vec::new();

        // 2. Token held on-chain.
        match self.rpc.list_addresses_by_asset(&self.token).await {
            Ok(balances) => {
                let held = balances
                    .get(self.self_address.as_str())
                    .is_some_and(|balance| *balance > 0.0);
                if !held {
                    causes.push(format!(
                        "wallet {} does not hold token {}",
                        self.self_address, self.token
                    ));
                }
            }
            Err(e) => causes.push(format!("token ownership check failed: {e}")),
        }

        // 3. Own pubkey revealed.
        match self.rpc.get_pubkey(&self.self_address).await {
            Ok(info) if info.is_revealed() => {}
            Ok(_) => causes.push(format!(
                "public key for {} is not revealed on-chain (send any transaction first)",
                self.self_address
            )),
            Err(e) => causes.push(format!("pubkey reveal check failed: {e}")),
        }

        causes
    }
}
