//! Persistent X25519 identity.
//!
//! The key file is plain JSON holding the unencrypted secret key. Its
//! presence decides between load and generate. Anyone who can read the
//! file can open every bundle addressed to it.

use std::io::Write;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::envelope::KeyPair;
use crate::error::{CryptoError, CryptoResult};

const KEY_FILE_VERSION: u32 = 1;
const KEY_ALGORITHM: &str = "x25519";

/// Source of the active keypair.
///
/// Callers borrow the keypair for the duration of one operation; the
/// secret never leaves the provider.
pub trait KeyProvider: Send + Sync {
    fn keypair(&self) -> &KeyPair;
}

impl KeyProvider for KeyPair {
    fn keypair(&self) -> &KeyPair {
        self
    }
}

/// On-disk representation of the identity. Wiped on drop.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct KeyFile {
    version: u32,
    algorithm: String,
    secret_key: String,
    public_key: String,
    created_at: i64,
}

impl KeyFile {
    fn from_keypair(keypair: &KeyPair) -> Self {
        Self {
            version: KEY_FILE_VERSION,
            algorithm: KEY_ALGORITHM.to_string(),
            secret_key: BASE64.encode(Zeroizing::new(keypair.secret_bytes()).as_slice()),
            public_key: BASE64.encode(keypair.public_bytes()),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    fn into_keypair(self) -> CryptoResult<KeyPair> {
        if self.version != KEY_FILE_VERSION {
            return Err(CryptoError::KeyFormat(format!(
                "unsupported key file version {}",
                self.version
            )));
        }
        if self.algorithm != KEY_ALGORITHM {
            return Err(CryptoError::KeyFormat(format!(
                "expected {KEY_ALGORITHM} key, found {}",
                self.algorithm
            )));
        }

        let secret = Zeroizing::new(
            BASE64
                .decode(self.secret_key.as_bytes())
                .map_err(|e| CryptoError::KeyFormat(format!("secret key: {e}")))?,
        );
        if secret.len() != 32 {
            return Err(CryptoError::KeyFormat(format!(
                "secret key must be 32 bytes, got {}",
                secret.len()
            )));
        }
        let mut bytes = Zeroizing::new([0u8; 32]);
        bytes.copy_from_slice(&secret);
        let keypair = KeyPair::from_secret_bytes(*bytes);

        let public = BASE64
            .decode(self.public_key.as_bytes())
            .map_err(|e| CryptoError::KeyFormat(format!("public key: {e}")))?;
        if public.as_slice() != keypair.public_bytes().as_slice() {
            return Err(CryptoError::KeyFormat(
                "public key does not match secret key".to_string(),
            ));
        }

        Ok(keypair)
    }
}

/// Loads the keypair at `path`, or generates and persists a new one.
pub fn load_or_create(path: &Path) -> CryptoResult<KeyPair> {
    if path.exists() {
        load(path)
    } else {
        let keypair = KeyPair::generate();
        save(path, &keypair)?;
        Ok(keypair)
    }
}

/// Loads an existing key file.
pub fn load(path: &Path) -> CryptoResult<KeyPair> {
    let json = Zeroizing::new(
        std::fs::read_to_string(path).map_err(|e| CryptoError::KeyIo(e.to_string()))?,
    );
    let file: KeyFile =
        serde_json::from_str(&json).map_err(|e| CryptoError::KeyFormat(e.to_string()))?;
    file.into_keypair()
}

/// Writes a key file atomically: temp file in the same directory, then rename.
pub fn save(path: &Path, keypair: &KeyPair) -> CryptoResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CryptoError::KeyIo(e.to_string()))?;
    }

    let json = Zeroizing::new(
        serde_json::to_string_pretty(&KeyFile::from_keypair(keypair))
            .map_err(|e| CryptoError::KeyIo(e.to_string()))?,
    );

    let tmp = temp_path(path);
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(&tmp)
        .map_err(|e| CryptoError::KeyIo(e.to_string()))?;
    file.write_all(json.as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| CryptoError::KeyIo(e.to_string()))?;
    drop(file);

    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        CryptoError::KeyIo(e.to_string())
    })
}

/// Sibling of `path` with `.tmp` appended, e.g. `identity.json.tmp`.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// File-backed [`KeyProvider`].
pub struct FileKeyStore {
    path: PathBuf,
    keypair: KeyPair,
}

impl FileKeyStore {
    /// Opens the store, generating a key on first use.
    pub fn load_or_create(path: impl AsRef<Path>) -> CryptoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let keypair = load_or_create(&path)?;
        Ok(Self { path, keypair })
    }

    /// Opens an existing key file. A missing file is [`CryptoError::KeyIo`];
    /// no key is generated.
    pub fn open(path: impl AsRef<Path>) -> CryptoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let keypair = load(&path)?;
        Ok(Self { path, keypair })
    }

    /// Returns the default key path under the platform data directory.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lockbox")
            .join("identity.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyProvider for FileKeyStore {
    fn keypair(&self) -> &KeyPair {
        &self.keypair
    }
}

impl std::fmt::Debug for FileKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKeyStore")
            .field("path", &self.path)
            .field("keypair", &self.keypair)
            .finish()
    }
}
