//! Local secp256k1 signer for producing account signatures off-chain

use crate::types::{PublicKey, SignerSignature};
use crate::{Error, Result};
use alloy_primitives::B256;
use k256::ecdsa::SigningKey;

/// Single-key signer backed by k256
#[derive(Clone)]
pub struct LocalSigner {
    key: SigningKey,
}

impl LocalSigner {
    /// Generate a fresh random key
    pub fn random() -> Self {
        Self {
            key: SigningKey::random(&mut rand::thread_rng()),
        }
    }

    /// Load a key from a 32-byte big-endian scalar
    pub fn from_slice(secret: &[u8]) -> Result<Self> {
        let key = SigningKey::from_slice(secret)
            .map_err(|e| Error::Signing(format!("invalid secret key: {}", e)))?;
        Ok(Self { key })
    }

    /// Uncompressed public key coordinates
    pub fn public_key(&self) -> PublicKey {
        let point = self.key.verifying_key().to_encoded_point(false);
        let bytes = point.as_bytes();
        PublicKey::new(B256::from_slice(&bytes[1..33]), B256::from_slice(&bytes[33..65]))
    }

    /// Sign a 32-byte hash without further hashing
    pub fn sign_prehash(&self, hash: &B256) -> Result<SignerSignature> {
        let (signature, _recovery_id) = self
            .key
            .sign_prehash_recoverable(hash.as_slice())
            .map_err(|e| Error::Signing(e.to_string()))?;
        let (r, s) = signature.split_bytes();

        Ok(SignerSignature::new(
            B256::from_slice(&r),
            B256::from_slice(&s),
            self.public_key(),
        ))
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}
