//! Error types for the crypto layer.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors raised by the key store and the envelope codec.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key file could not be read or written.
    #[error("key storage I/O failed: {0}")]
    KeyIo(String),

    /// Stored key material is present but unparsable, or not X25519.
    #[error("invalid key file: {0}")]
    KeyFormat(String),

    /// Bundle does not have the three well-formed fields.
    #[error("malformed bundle: {0}")]
    BundleFormat(String),

    /// The wrapped key cannot be opened with the held secret key.
    #[error("wrapped key cannot be opened with this key")]
    KeyMismatch,

    /// Authentication tag did not verify.
    #[error("payload integrity check failed")]
    Integrity,

    /// Unexpected failure while encrypting.
    #[error("encryption failed: {0}")]
    Encryption(String),
}
