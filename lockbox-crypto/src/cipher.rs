//! ChaCha20-Poly1305 payload encryption under one-time symmetric keys.

use chacha20poly1305::aead::{Aead, KeyInit, OsRng};
use chacha20poly1305::{AeadCore, ChaCha20Poly1305, Key, Nonce};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, CryptoResult};

/// Symmetric key size in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Nonce size in bytes (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// A one-time payload key. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PayloadKey([u8; KEY_SIZE]);

impl PayloadKey {
    /// Generates a fresh key from the OS CSPRNG.
    pub fn generate() -> Self {
        let key = ChaCha20Poly1305::generate_key(&mut OsRng);
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(key.as_slice());
        Self(bytes)
    }

    /// Rebuilds a key from raw bytes, e.g. after unwrapping.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| CryptoError::KeyMismatch)?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for PayloadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PayloadKey(..)")
    }
}

/// Generates a fresh random nonce.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let mut bytes = [0u8; NONCE_SIZE];
    bytes.copy_from_slice(nonce.as_slice());
    bytes
}

/// Encrypts `plaintext`, returning ciphertext with the tag appended.
pub fn seal_payload(
    key: &PayloadKey,
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| CryptoError::Encryption(format!("payload seal failed: {e}")))
}

/// Decrypts and verifies a payload. No plaintext is returned unless the tag verifies.
pub fn open_payload(
    key: &PayloadKey,
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Integrity)
}
