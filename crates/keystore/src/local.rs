//! In-process keystore with optional on-disk keyring.
//!
//! Each key is persisted as `<dir>/<name>.json`. Keys carry a SHA-256 digest
//! of the passphrase they were created with; signing requires the same
//! passphrase.

use crate::error::KeystoreError;
use crate::key::KeyPair;
use crate::{KeyInfo, Keystore, SignedBytes};
use drip_common::AccAddress;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info, warn};

struct StoredKey {
    pair: KeyPair,
    passphrase_hash: [u8; 32],
}

impl StoredKey {
    fn info(&self, name: &str) -> KeyInfo {
        KeyInfo {
            name: name.to_string(),
            address: self.pair.address(),
            public_key: self.pair.public_key_bytes(),
        }
    }
}

/// On-disk key record
#[derive(Debug, Serialize, Deserialize)]
struct KeyFile {
    name: String,
    address: String,
    public_key: String,
    private_key: String,
    passphrase_hash: String,
}

fn passphrase_hash(passphrase: &str) -> [u8; 32] {
    Sha256::digest(passphrase.as_bytes()).into()
}

pub struct LocalKeystore {
    dir: Option<PathBuf>,
    keys: RwLock<HashMap<String, StoredKey>>,
}

impl Default for LocalKeystore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalKeystore {
    /// Memory-only keystore
    pub fn new() -> Self {
        Self {
            dir: None,
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Open (or create) a keyring directory and load every `*.json` key in it.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, KeystoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let mut keys = HashMap::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let file: KeyFile = serde_json::from_slice(&std::fs::read(&path)?)?;
            let pair = KeyPair::from_private_key_hex(&file.private_key)?;
            let hash = hex::decode(&file.passphrase_hash)
                .ok()
                .and_then(|b| <[u8; 32]>::try_from(b.as_slice()).ok())
                .ok_or_else(|| {
                    KeystoreError::InvalidKey(format!("bad passphrase digest in {:?}", path))
                })?;

            if file.address != hex::encode(pair.address().0) {
                warn!("Key file {:?} address does not match its private key", path);
            }

            debug!("Loaded key {} from {:?}", file.name, path);
            keys.insert(
                file.name,
                StoredKey {
                    pair,
                    passphrase_hash: hash,
                },
            );
        }

        info!("Opened keyring at {:?} with {} keys", dir, keys.len());
        Ok(Self {
            dir: Some(dir),
            keys: RwLock::new(keys),
        })
    }

    /// Generate a fresh key under `name`.
    pub fn add(&self, name: &str, passphrase: &str) -> Result<KeyInfo, KeystoreError> {
        self.insert(name, KeyPair::random(), passphrase)
    }

    /// Import an existing hex-encoded secret key under `name`.
    pub fn import(
        &self,
        name: &str,
        private_key_hex: &str,
        passphrase: &str,
    ) -> Result<KeyInfo, KeystoreError> {
        let pair = KeyPair::from_private_key_hex(private_key_hex)?;
        self.insert(name, pair, passphrase)
    }

    pub fn list(&self) -> Vec<KeyInfo> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        let mut infos: Vec<KeyInfo> = keys.iter().map(|(name, key)| key.info(name)).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    fn insert(&self, name: &str, pair: KeyPair, passphrase: &str) -> Result<KeyInfo, KeystoreError> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(KeystoreError::InvalidKey(format!("invalid key name {:?}", name)));
        }

        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        if keys.contains_key(name) {
            return Err(KeystoreError::KeyExists(name.to_string()));
        }

        let stored = StoredKey {
            pair,
            passphrase_hash: passphrase_hash(passphrase),
        };

        if let Some(dir) = &self.dir {
            let file = KeyFile {
                name: name.to_string(),
                address: hex::encode(stored.pair.address().0),
                public_key: hex::encode(stored.pair.public_key_bytes()),
                private_key: stored.pair.private_key_hex(),
                passphrase_hash: hex::encode(stored.passphrase_hash),
            };
            let path = dir.join(format!("{}.json", name));
            std::fs::write(&path, serde_json::to_vec_pretty(&file)?)?;
            debug!("Persisted key {} to {:?}", name, path);
        }

        let info = stored.info(name);
        keys.insert(name.to_string(), stored);
        info!("Stored key {}", name);
        Ok(info)
    }
}

impl Keystore for LocalKeystore {
    fn key_by_name(&self, name: &str) -> Result<KeyInfo, KeystoreError> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        keys.get(name)
            .map(|key| key.info(name))
            .ok_or_else(|| KeystoreError::KeyNotFound(name.to_string()))
    }

    fn key_by_address(&self, address: &AccAddress) -> Result<KeyInfo, KeystoreError> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        keys.iter()
            .find(|(_, key)| key.pair.address() == *address)
            .map(|(name, key)| key.info(name))
            .ok_or_else(|| KeystoreError::KeyNotFound(hex::encode_upper(address.0)))
    }

    fn sign(&self, name: &str, passphrase: &str, msg: &[u8]) -> Result<SignedBytes, KeystoreError> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        let key = keys
            .get(name)
            .ok_or_else(|| KeystoreError::KeyNotFound(name.to_string()))?;

        if key.passphrase_hash != passphrase_hash(passphrase) {
            return Err(KeystoreError::WrongPassphrase(name.to_string()));
        }

        Ok(SignedBytes {
            signature: key.pair.sign(msg),
            public_key: key.pair.public_key_bytes(),
        })
    }
}
