//! Envelope encryption layer for Lockbox.
//!
//! Provides hybrid encryption of arbitrary payloads using:
//! - X25519 + XSalsa20-Poly1305 to wrap one-time payload keys
//! - ChaCha20-Poly1305 for authenticated payload encryption
//! - A persistent X25519 identity stored as a JSON key file
//!
//! # Architecture
//!
//! Every `lock` call draws a fresh 256-bit payload key and nonce, so two
//! bundles of the same plaintext never match. The payload key is sealed to
//! the identity's public key and travels inside the bundle:
//!
//! 1. **Identity**: one X25519 keypair per installation, loaded from or
//!    created at a key file ([`keystore`]).
//!
//! 2. **Bundle**: wrapped key, nonce and ciphertext+tag as three
//!    printable lines ([`EncryptedBundle`]).
//!
//! Only the matching secret key can open a bundle; a foreign key fails with
//! [`CryptoError::KeyMismatch`] and any altered ciphertext fails with
//! [`CryptoError::Integrity`].

mod bundle;
mod cipher;
pub mod codec;
pub mod envelope;
mod error;
pub mod keystore;

pub use bundle::EncryptedBundle;
pub use cipher::{KEY_SIZE, NONCE_SIZE, PayloadKey, TAG_SIZE};
pub use codec::{lock, lock_bytes, unlock, unlock_bytes};
pub use envelope::{KeyPair, WRAPPED_KEY_SIZE, WrappedKey, unwrap_key, wrap_key};
pub use error::{CryptoError, CryptoResult};
pub use keystore::{FileKeyStore, KeyProvider, load_or_create};

pub use crypto_box::{PublicKey, SecretKey};
