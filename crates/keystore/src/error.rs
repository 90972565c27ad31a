use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeystoreError {
    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("key already exists: {0}")]
    KeyExists(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("invalid passphrase for key {0}")]
    WrongPassphrase(String),

    #[error("keyring I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("keyring file is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
}
