//! Signing-key handling for the DepinChat client.
//!
//! The WIF signing key lives encrypted inside `config.json` and is
//! unlocked once at startup with a password:
//!
//! - [`secret_store`] — scrypt-derived AES-256-GCM encryption of the
//!   WIF at rest, in the `salt:iv:tag:ct` record form.
//! - [`prompt`] — the masked password-input state machine and the
//!   bounded-attempt unlock loop.
//! - [`wallet`] — the unlocked in-memory wallet (keys + address).

pub mod prompt;
pub mod secret_store;
pub mod wallet;

pub use wallet::Wallet;
