//! Credentials as typed by the user, cleaned of prompt encoding artifacts.

use zeroize::{Zeroize, ZeroizeOnDrop};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

/// UTF-8 BOM bytes read as Latin-1 / Windows-1252.
const MOJIBAKE_BOM: &str = "\u{EF}\u{BB}\u{BF}";

/// A secret supplied by the user. Wiped on drop, never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential(String);

impl Credential {
    /// Wraps an already-clean secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Builds a credential from one line of prompt output.
    ///
    /// Strips a leading BOM (decoded or mojibake) and the line terminator.
    pub fn from_prompt_line(line: &str) -> Self {
        let mut rest = line;
        loop {
            if let Some(r) = rest.strip_prefix('\u{FEFF}') {
                rest = r;
            } else if let Some(r) = rest.strip_prefix(MOJIBAKE_BOM) {
                rest = r;
            } else {
                break;
            }
        }
        let rest = rest.trim_end_matches(['\r', '\n']);
        Self(rest.to_string())
    }

    /// Builds a credential from raw prompt bytes, honoring a UTF-8 or
    /// UTF-16 byte-order mark. Invalid UTF-8 is replaced lossily.
    pub fn from_prompt_bytes(bytes: &[u8]) -> Self {
        if let Some(rest) = bytes.strip_prefix(UTF16_LE_BOM) {
            return Self::from_prompt_line(&decode_utf16(rest, u16::from_le_bytes));
        }
        if let Some(rest) = bytes.strip_prefix(UTF16_BE_BOM) {
            return Self::from_prompt_line(&decode_utf16(rest, u16::from_be_bytes));
        }
        let rest = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        Self::from_prompt_line(&String::from_utf8_lossy(rest))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> String {
    let units = bytes.chunks_exact(2).map(|pair| to_unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Source of one line of user-typed text (an interactive prompt, a pipe).
pub trait CredentialPrompt {
    fn read_line(&self) -> std::io::Result<String>;
}
