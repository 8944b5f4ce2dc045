//! DepinChat — terminal client for the token-gated messaging overlay.
//!
//! Startup: load `config.json`, unlock the WIF signing key (three
//! password attempts), derive the wallet identity, then hand
//! everything to the engine task and bridge its events to the
//! terminal. Exit code 0 on a clean quit, 1 on any fatal startup
//! error.

mod password;
mod shutdown;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use depinchat_crypto::EnvelopeCipher;
use depinchat_engine::engine::{Engine, EngineSetup};
use depinchat_engine::Identity;
use depinchat_rpc::HttpRpcClient;
use depinchat_types::config::ClientConfig;
use depinchat_types::{DepinError, MessageCipher, Result};
use depinchat_wallet::prompt::unlock_with;
use depinchat_wallet::Wallet;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Encrypted group and private messaging for token holders.
#[derive(Parser)]
#[command(name = "depinchat", version, about)]
struct Cli {
    /// Path to the config file produced by the setup wizard.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Verbose logging (equivalent to RUST_LOG=debug).
    #[arg(long, short)]
    verbose: bool,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("fatal: {e}");
            1
        }
    };

    shutdown::reset_terminal();
    std::process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = ClientConfig::load(&cli.config)?;
    tracing::info!(
        rpc_url = %config.rpc_url,
        token = %config.token,
        poll_interval_ms = config.poll_interval_ms,
        "config loaded"
    );

    let wallet = unlock_wallet(&config).await?;
    tracing::info!(address = %wallet.address(), "wallet unlocked");

    let identity = Identity {
        address: wallet.address().clone(),
        pubkey: wallet.pubkey().clone(),
        private_key: wallet.wif().to_owned(),
    };

    let rpc = Arc::new(HttpRpcClient::from_config(&config));
    let cipher: Arc<dyn MessageCipher> = Arc::new(EnvelopeCipher::new());

    let controller = shutdown::ShutdownController::install();
    let (engine, handle, events) = Engine::new(
        EngineSetup {
            rpc,
            cipher,
            identity,
            token: config.token.clone(),
            poll_interval_ms: config.poll_interval_ms,
        },
        controller.subscribe(),
    );
    tokio::spawn(engine.run());

    let adapter = ui::UiAdapter::new(wallet.address().clone(), config.timezone);
    adapter.run(events, handle, controller.sender()).await;

    Ok(())
}

/// Interactive unlock of the encrypted WIF record.
///
/// scrypt derivation and the blocking terminal reads run off the
/// async runtime on the blocking pool.
async fn unlock_wallet(config: &ClientConfig) -> Result<Wallet> {
    let encoded = config.encrypted_private_key.clone();
    let wif = tokio::task::spawn_blocking(move || {
        let mut prompt = password::TerminalPrompt;
        unlock_with(&encoded, &mut prompt)
    })
    .await
    .map_err(|e| DepinError::Message {
        reason: format!("unlock task failed: {e}"),
    })??;

    Wallet::from_wif(wif)
}
