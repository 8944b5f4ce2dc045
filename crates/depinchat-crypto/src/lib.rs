//! Envelope cryptography for the DepinChat client.
//!
//! Implements the [`MessageCipher`](depinchat_types::MessageCipher)
//! boundary on secp256k1: per-message ephemeral ECDH wraps a random
//! AES-256-GCM content key for every recipient, recipients are
//! addressed by the `hash160` of their public key, and the whole
//! envelope carries an ECDSA signature by the sender.
//!
//! # Modules
//!
//! - [`hash`] — SHA-256, double SHA-256, and `hash160`.
//! - [`keys`] — WIF decoding and secp256k1 key material.
//! - [`aead`] — AES-256-GCM helpers.
//! - [`ecdh`] — ephemeral/static key agreement and key wrapping.
//! - [`wire`] — compact-size integers and length-prefixed vectors.
//! - [`envelope`] — envelope build/open on the wire format.
//! - [`pool`] — the server-side privacy layer (ECIES to the pool key).
//! - [`cipher`] — [`EnvelopeCipher`], the `MessageCipher` impl.

pub mod aead;
pub mod cipher;
pub mod ecdh;
pub mod envelope;
pub mod hash;
pub mod keys;
pub mod pool;
pub mod wire;

pub use cipher::EnvelopeCipher;
