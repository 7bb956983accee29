//! Hybrid envelope codec.
//!
//! `lock` draws a fresh payload key and nonce, seals the payload with
//! ChaCha20-Poly1305 and wraps the key to the recipient's public key.
//! `unlock` reverses this and returns plaintext only after the tag verifies.

use crypto_box::{PublicKey, SecretKey};

use crate::bundle::EncryptedBundle;
use crate::cipher::{PayloadKey, generate_nonce, open_payload, seal_payload};
use crate::envelope::{unwrap_key, wrap_key};
use crate::error::CryptoResult;

/// Encrypts `plaintext` into a new bundle addressed to `public_key`.
pub fn lock(plaintext: &[u8], public_key: &PublicKey) -> CryptoResult<EncryptedBundle> {
    let key = PayloadKey::generate();
    let nonce = generate_nonce();

    let ciphertext = seal_payload(&key, &nonce, plaintext)?;
    let wrapped_key = wrap_key(&key, public_key)?;

    Ok(EncryptedBundle {
        wrapped_key,
        nonce,
        ciphertext,
    })
}

/// Decrypts a bundle with the matching secret key.
pub fn unlock(bundle: &EncryptedBundle, secret_key: &SecretKey) -> CryptoResult<Vec<u8>> {
    let key = unwrap_key(&bundle.wrapped_key, secret_key)?;
    open_payload(&key, &bundle.nonce, &bundle.ciphertext)
}

/// [`lock`] followed by serialization to the text form.
pub fn lock_bytes(plaintext: &[u8], public_key: &PublicKey) -> CryptoResult<Vec<u8>> {
    lock(plaintext, public_key).map(|bundle| bundle.to_bytes())
}

/// Strict parse of a serialized bundle followed by [`unlock`].
pub fn unlock_bytes(serialized: &[u8], secret_key: &SecretKey) -> CryptoResult<Vec<u8>> {
    let bundle = EncryptedBundle::from_bytes(serialized)?;
    unlock(&bundle, secret_key)
}
