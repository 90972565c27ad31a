use crate::error::KeystoreError;
use drip_common::AccAddress;
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand_core::OsRng;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// secp256k1 account key.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.public_key_bytes()))
            .finish()
    }
}

impl KeyPair {
    pub fn random() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        Self { signing_key }
    }

    pub fn from_private_key_hex(hex_str: &str) -> Result<Self, KeystoreError> {
        let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let bytes = hex::decode(hex_str).map_err(|e| KeystoreError::InvalidKey(e.to_string()))?;
        let signing_key =
            SigningKey::from_slice(&bytes).map_err(|e| KeystoreError::InvalidKey(e.to_string()))?;
        Ok(Self { signing_key })
    }

    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Compressed SEC1 encoding
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    pub fn address(&self) -> AccAddress {
        address_from_public_key(&self.public_key_bytes())
    }

    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        let signature: Signature = self.signing_key.sign(msg);
        let signature = signature.normalize_s().unwrap_or(signature);
        signature.to_vec()
    }
}

/// `RIPEMD160(SHA256(pubkey))`
pub fn address_from_public_key(public_key: &[u8]) -> AccAddress {
    let sha = Sha256::digest(public_key);
    let digest = Ripemd160::digest(sha);
    let mut addr = [0u8; drip_common::types::ADDRESS_LENGTH];
    addr.copy_from_slice(&digest);
    AccAddress(addr)
}

pub fn verify(public_key_bytes: &[u8], msg: &[u8], signature_bytes: &[u8]) -> Result<bool, KeystoreError> {
    let public_key = VerifyingKey::from_sec1_bytes(public_key_bytes)
        .map_err(|e| KeystoreError::InvalidKey(e.to_string()))?;
    let signature = Signature::from_slice(signature_bytes)
        .map_err(|e| KeystoreError::InvalidKey(e.to_string()))?;

    Ok(public_key.verify(msg, &signature).is_ok())
}
