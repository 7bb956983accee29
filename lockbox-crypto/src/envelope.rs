//! Asymmetric identity and symmetric-key wrapping.
//!
//! Uses X25519 key exchange + XSalsa20-Poly1305 for wrapping one-time
//! payload keys. Each key is sealed with the recipient's public key using
//! an ephemeral keypair, so only the matching secret key can open it and
//! the sender's identity is not revealed.

use crate::cipher::{KEY_SIZE, PayloadKey, TAG_SIZE};
use crate::error::{CryptoError, CryptoResult};
use crypto_box::aead::{Aead, AeadCore, OsRng};
use crypto_box::{PublicKey, SalsaBox, SecretKey};

/// X25519 public key length.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// XSalsa20 nonce length.
pub const WRAP_NONCE_SIZE: usize = 24;

/// Serialized length of a [`WrappedKey`]: ephemeral key, nonce, sealed key + tag.
pub const WRAPPED_KEY_SIZE: usize = PUBLIC_KEY_SIZE + WRAP_NONCE_SIZE + KEY_SIZE + TAG_SIZE;

/// X25519 keypair acting as the installation's identity.
///
/// The secret key implements `ZeroizeOnDrop` automatically (from crypto_box).
pub struct KeyPair {
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl KeyPair {
    /// Generates a new keypair from the OS CSPRNG.
    pub fn generate() -> Self {
        let secret = SecretKey::generate(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Returns the public key as raw 32-byte array.
    pub fn public_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// Returns the secret key as raw 32-byte array.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// Reconstructs a keypair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = SecretKey::from(bytes);
        let public = secret.public_key();
        Self { secret, public }
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex::encode(self.public.as_bytes()))
            .finish_non_exhaustive()
    }
}

/// A payload key sealed to a recipient's X25519 public key.
///
/// The ephemeral public key is included so the recipient can reconstruct
/// the shared secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrappedKey {
    /// Ephemeral X25519 public key (sender side of DH).
    pub ephemeral_public_key: [u8; PUBLIC_KEY_SIZE],
    /// XSalsa20 nonce.
    pub nonce: [u8; WRAP_NONCE_SIZE],
    /// Sealed payload key (XSalsa20-Poly1305 ciphertext + tag).
    pub ciphertext: Vec<u8>,
}

impl WrappedKey {
    /// Flattens to `ephemeral_pk || nonce || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(WRAPPED_KEY_SIZE);
        out.extend_from_slice(&self.ephemeral_public_key);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Splits a flattened wrapped key. Only the exact length is accepted.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != WRAPPED_KEY_SIZE {
            return Err(CryptoError::BundleFormat(format!(
                "wrapped key must be {WRAPPED_KEY_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let (epk, rest) = bytes.split_at(PUBLIC_KEY_SIZE);
        let (nonce, ciphertext) = rest.split_at(WRAP_NONCE_SIZE);

        let mut ephemeral_public_key = [0u8; PUBLIC_KEY_SIZE];
        ephemeral_public_key.copy_from_slice(epk);
        let mut nonce_bytes = [0u8; WRAP_NONCE_SIZE];
        nonce_bytes.copy_from_slice(nonce);

        Ok(Self {
            ephemeral_public_key,
            nonce: nonce_bytes,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

/// Seals a payload key for a recipient using anonymous envelope encryption.
///
/// An ephemeral X25519 keypair is generated for each seal operation.
pub fn wrap_key(key: &PayloadKey, recipient_pk: &PublicKey) -> CryptoResult<WrappedKey> {
    let ephemeral = SecretKey::generate(&mut OsRng);
    let ephemeral_pk = ephemeral.public_key();

    let salsa_box = SalsaBox::new(recipient_pk, &ephemeral);
    let nonce = SalsaBox::generate_nonce(&mut OsRng);

    let ciphertext = salsa_box
        .encrypt(&nonce, key.as_bytes().as_slice())
        .map_err(|e| CryptoError::Encryption(format!("key wrap failed: {e}")))?;

    let mut nonce_bytes = [0u8; WRAP_NONCE_SIZE];
    nonce_bytes.copy_from_slice(nonce.as_slice());

    Ok(WrappedKey {
        ephemeral_public_key: *ephemeral_pk.as_bytes(),
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Opens a wrapped payload key using the recipient's secret key.
///
/// Every failure maps to [`CryptoError::KeyMismatch`]; the box does not
/// distinguish a foreign key from a damaged envelope.
pub fn unwrap_key(wrapped: &WrappedKey, recipient_sk: &SecretKey) -> CryptoResult<PayloadKey> {
    let ephemeral_pk = PublicKey::from(wrapped.ephemeral_public_key);
    let salsa_box = SalsaBox::new(&ephemeral_pk, recipient_sk);

    let opened = salsa_box
        .decrypt(
            crypto_box::Nonce::from_slice(&wrapped.nonce),
            wrapped.ciphertext.as_slice(),
        )
        .map_err(|_| CryptoError::KeyMismatch)?;

    let opened = zeroize::Zeroizing::new(opened);
    PayloadKey::from_slice(&opened)
}
