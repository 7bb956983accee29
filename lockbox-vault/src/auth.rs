//! Credential verification seam.
//!
//! The controller only asks "is this credential accepted?". Host account
//! checks, hardware tokens or a stored passphrase hash all plug in here.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Argon2, Params};

use crate::credential::Credential;
use crate::error::AuthError;

/// Decides whether a credential unlocks the session.
///
/// `Ok(false)` and `Err(_)` are both treated as a denial by the controller.
pub trait Authenticator: Send + Sync {
    fn verify(&self, credential: &Credential) -> Result<bool, AuthError>;
}

impl<F> Authenticator for F
where
    F: Fn(&Credential) -> Result<bool, AuthError> + Send + Sync,
{
    fn verify(&self, credential: &Credential) -> Result<bool, AuthError> {
        self(credential)
    }
}

/// Accepts credentials matching a stored Argon2id hash (PHC string).
#[derive(Clone, Debug)]
pub struct PassphraseAuthenticator {
    phc: String,
}

impl PassphraseAuthenticator {
    /// Hashes `passphrase` with default Argon2id parameters.
    pub fn from_passphrase(passphrase: &str) -> Result<Self, AuthError> {
        Self::hash_with(passphrase, Params::default())
    }

    /// Hashes `passphrase` with explicit Argon2id parameters.
    pub fn hash_with(passphrase: &str, params: Params) -> Result<Self, AuthError> {
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
        let salt = SaltString::generate(&mut OsRng);
        let hash = argon2
            .hash_password(passphrase.as_bytes(), &salt)
            .map_err(|e| AuthError::InvalidHash(e.to_string()))?;
        Ok(Self {
            phc: hash.to_string(),
        })
    }

    /// Uses an existing PHC hash string, e.g. loaded from settings.
    pub fn from_phc(phc: impl Into<String>) -> Result<Self, AuthError> {
        let phc = phc.into();
        PasswordHash::new(&phc).map_err(|e| AuthError::InvalidHash(e.to_string()))?;
        Ok(Self { phc })
    }

    /// The stored PHC string, suitable for persisting.
    pub fn phc(&self) -> &str {
        &self.phc
    }
}

impl Authenticator for PassphraseAuthenticator {
    fn verify(&self, credential: &Credential) -> Result<bool, AuthError> {
        let parsed =
            PasswordHash::new(&self.phc).map_err(|e| AuthError::InvalidHash(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(credential.expose().as_bytes(), &parsed)
            .is_ok())
    }
}
