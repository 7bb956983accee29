//! Credential-gated lock controller for Lockbox.
//!
//! Locks a batch of target resources by replacing each body with an
//! envelope bundle, and restores them only after an [`Authenticator`]
//! accepts a credential. Each denied attempt wraps the batch in one more
//! layer; a successful attempt peels every layer.
//!
//! Resource bodies are replaced through a [`ResourceStore`] in two phases
//! (stage, then commit) so a batch either advances as a whole or not at
//! all. An optional [`SessionJournal`] makes interrupted batches resumable.

pub mod auth;
pub mod config;
mod controller;
pub mod credential;
mod error;
pub mod journal;
pub mod resource;

pub use auth::{Authenticator, PassphraseAuthenticator};
pub use config::LockConfig;
pub use controller::{AttemptResult, LockController, LockSession, LockState, UnlockOutcome};
pub use credential::{Credential, CredentialPrompt};
pub use error::{AuthError, VaultError, VaultResult};
pub use journal::SessionJournal;
pub use resource::{FileStore, MemoryStore, ResourceId, ResourceStore};
