//! Lock controller error types.

use lockbox_crypto::CryptoError;
use thiserror::Error;

use crate::resource::ResourceId;

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors that can occur while locking or unlocking a batch.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("resource {resource}: {message}")]
    ResourceIo { resource: ResourceId, message: String },

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("resource {resource}: {source}")]
    ResourceCrypto {
        resource: ResourceId,
        #[source]
        source: CryptoError,
    },

    #[error("session journal error: {0}")]
    Journal(String),

    #[error("lock depth diverged: session at depth {expected}, resource {resource} carries no bundle")]
    DepthDiverged { resource: ResourceId, expected: u32 },

    #[error("a batch is partially committed; recover before continuing")]
    PendingCommit,

    #[error("session is not locked")]
    NotLocked,

    #[error("lock depth limit reached")]
    DepthLimit,

    #[error("no resources in batch")]
    EmptyBatch,

    #[error("credential prompt failed: {0}")]
    Prompt(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl VaultError {
    pub(crate) fn io(resource: &ResourceId, err: impl std::fmt::Display) -> Self {
        Self::ResourceIo {
            resource: resource.clone(),
            message: err.to_string(),
        }
    }
}

/// Failure reported by an [`Authenticator`](crate::Authenticator) that
/// could not reach a verdict.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("verification service unavailable: {0}")]
    Unavailable(String),

    #[error("stored credential hash is invalid: {0}")]
    InvalidHash(String),
}
