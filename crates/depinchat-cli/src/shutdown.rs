//! Process shutdown: signals in, terminal reset out.
//!
//! One controller owns the shutdown watch channel. Ctrl-C and
//! SIGTERM flip it; every component observes the same flag. The
//! terminal reset runs on every exit path, including fatal startup
//! errors, so a crashed session never leaves the terminal in raw
//! mode or the alternate screen.

use std::io::Write;

use crossterm::{cursor, event, style, terminal};
use tokio::sync::watch;

/// Owns the shutdown flag and the terminal restore sequence.
pub struct ShutdownController {
    tx: watch::Sender<bool>,
}

impl ShutdownController {
    /// Creates the controller and installs signal handlers.
    pub fn install() -> Self {
        let (tx, _) = watch::channel(false);

        let signal_tx = tx.clone();
        tokio::spawn(async move {
            let ctrl_c = tokio::signal::ctrl_c();
            #[cfg(unix)]
            {
                let mut term = match tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate(),
                ) {
                    Ok(term) => term,
                    Err(e) => {
                        tracing::warn!(%e, "cannot install SIGTERM handler");
                        let _ = ctrl_c.await;
                        let _ = signal_tx.send(true);
                        return;
                    }
                };
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = term.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = ctrl_c.await;
            }
            tracing::info!("shutdown signal received");
            let _ = signal_tx.send(true);
        });

        Self { tx }
    }

    /// The shared shutdown sender; subscribe for receivers.
    pub fn sender(&self) -> watch::Sender<bool> {
        self.tx.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Restores the terminal to a sane state. Safe to run more than once
/// and on a terminal that was never modified.
pub fn reset_terminal() {
    let _ = terminal::disable_raw_mode();
    let mut out = std::io::stdout();
    let _ = crossterm::execute!(
        out,
        terminal::LeaveAlternateScreen,
        cursor::Show,
        style::ResetColor,
        event::DisableMouseCapture,
        event::DisableBracketedPaste,
        event::DisableFocusChange,
    );
    let _ = out.flush();
}
