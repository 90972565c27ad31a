//! Named secp256k1 signing keys for the faucet.
//!
//! The faucet only ever talks to a [`Keystore`]; [`LocalKeystore`] is the
//! in-process implementation backed by an optional keyring directory.

pub mod error;
pub mod key;
pub mod local;

pub use error::KeystoreError;
pub use key::{verify, KeyPair};
pub use local::LocalKeystore;

use drip_common::AccAddress;

/// Passphrase the faucet uses when asking the keystore for a signature.
pub const DEFAULT_KEY_PASS: &str = "12345678";

/// Public view of a stored key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub name: String,
    pub address: AccAddress,
    /// Compressed SEC1 public key (33 bytes)
    pub public_key: Vec<u8>,
}

/// Output of [`Keystore::sign`].
#[derive(Debug, Clone)]
pub struct SignedBytes {
    /// Compact `r || s` signature, low-S normalised
    pub signature: Vec<u8>,
    pub public_key: Vec<u8>,
}

/// Key lookup and signing capability.
pub trait Keystore: Send + Sync {
    fn key_by_name(&self, name: &str) -> Result<KeyInfo, KeystoreError>;

    fn key_by_address(&self, address: &AccAddress) -> Result<KeyInfo, KeystoreError>;

    /// Sign `msg` (hashed with SHA-256) with the key stored under `name`.
    fn sign(&self, name: &str, passphrase: &str, msg: &[u8]) -> Result<SignedBytes, KeystoreError>;
}
