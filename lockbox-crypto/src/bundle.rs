//! Three-line text form of an encrypted bundle.
//!
//! ```text
//! <base64 wrapped key>
//! <hex nonce>
//! <base64 ciphertext+tag>
//! ```
//!
//! Fields are positional. Everything is validated before any key is touched.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::cipher::{NONCE_SIZE, TAG_SIZE};
use crate::envelope::WrappedKey;
use crate::error::{CryptoError, CryptoResult};

const FIELD_COUNT: usize = 3;

/// A parsed envelope: wrapped key, payload nonce and sealed payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedBundle {
    pub wrapped_key: WrappedKey,
    pub nonce: [u8; NONCE_SIZE],
    /// Payload ciphertext with the Poly1305 tag appended.
    pub ciphertext: Vec<u8>,
}

impl EncryptedBundle {
    /// Serializes to the three-line text form, without a trailing newline.
    pub fn to_text(&self) -> String {
        format!(
            "{}\n{}\n{}",
            BASE64.encode(self.wrapped_key.to_bytes()),
            hex::encode(self.nonce),
            BASE64.encode(&self.ciphertext)
        )
    }

    /// Serialized form as bytes, ready to replace a resource body.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_text().into_bytes()
    }

    /// Parses the text form strictly by position.
    pub fn parse(text: &str) -> CryptoResult<Self> {
        let text = text
            .strip_suffix("\r\n")
            .or_else(|| text.strip_suffix('\n'))
            .unwrap_or(text);

        let lines: Vec<&str> = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect();
        if lines.len() != FIELD_COUNT {
            return Err(CryptoError::BundleFormat(format!(
                "expected {FIELD_COUNT} lines, found {}",
                lines.len()
            )));
        }
        if let Some(idx) = lines.iter().position(|l| l.is_empty()) {
            return Err(CryptoError::BundleFormat(format!("line {} is empty", idx + 1)));
        }

        let wrapped_raw = BASE64
            .decode(lines[0])
            .map_err(|e| CryptoError::BundleFormat(format!("wrapped key: {e}")))?;
        let wrapped_key = WrappedKey::from_bytes(&wrapped_raw)?;

        let nonce_raw =
            hex::decode(lines[1]).map_err(|e| CryptoError::BundleFormat(format!("nonce: {e}")))?;
        let nonce: [u8; NONCE_SIZE] = nonce_raw.as_slice().try_into().map_err(|_| {
            CryptoError::BundleFormat(format!(
                "nonce must be {NONCE_SIZE} bytes, got {}",
                nonce_raw.len()
            ))
        })?;

        let ciphertext = BASE64
            .decode(lines[2])
            .map_err(|e| CryptoError::BundleFormat(format!("ciphertext: {e}")))?;
        if ciphertext.len() < TAG_SIZE {
            return Err(CryptoError::BundleFormat(format!(
                "ciphertext shorter than the {TAG_SIZE}-byte tag"
            )));
        }

        Ok(Self {
            wrapped_key,
            nonce,
            ciphertext,
        })
    }

    /// Parses a resource body. Non-UTF-8 input is a format error.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| CryptoError::BundleFormat("bundle is not valid UTF-8".to_string()))?;
        Self::parse(text)
    }

    /// Cheap check used to detect whether a body carries a bundle layer.
    pub fn is_bundle(bytes: &[u8]) -> bool {
        Self::from_bytes(bytes).is_ok()
    }
}
