//! Signature verifiers and the rotatable key registry
//!
//! [`SignatureVerifier`] checks a signature against a key supplied by the
//! caller. [`VerifierContext`] holds one trusted key and answers whether a
//! signature was produced by it; its owner may rotate that key.

use super::curve;
use crate::types::PublicKey;
use crate::{Error, Result};
use alloy_primitives::{Address, B256};
use parking_lot::RwLock;
use std::fmt;
use tracing::{debug, info, warn};

/// Verifies ECDSA signatures against explicit public keys
pub trait SignatureVerifier: Send + Sync + fmt::Debug {
    /// Check `(r, s)` over `hash` for `public_key`
    fn verify(&self, hash: &B256, r: &B256, s: &B256, public_key: &PublicKey) -> bool;
}

/// Hand-written secp256k1 verifier
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Verifier;

impl Secp256k1Verifier {
    /// Create a new verifier
    pub const fn new() -> Self {
        Self
    }
}

impl SignatureVerifier for Secp256k1Verifier {
    fn verify(&self, hash: &B256, r: &B256, s: &B256, public_key: &PublicKey) -> bool {
        curve::verify(hash, r, s, &public_key.x, &public_key.y)
    }
}

/// Answers whether a signature was produced by a trusted party
pub trait SignatureAuthority: Send + Sync + fmt::Debug {
    /// Validate `(r, s)` over `hash` against the trusted key
    fn validate_signature(&self, hash: &B256, r: &B256, s: &B256) -> bool;
}

/// Registry holding the current trusted key
pub struct VerifierContext {
    owner: Address,
    verifier: Box<dyn SignatureVerifier>,
    trusted_key: RwLock<PublicKey>,
}

impl VerifierContext {
    /// Create a context trusting `key`, validated on the curve
    pub fn new(owner: Address, key: PublicKey) -> Result<Self> {
        Self::with_verifier(owner, key, Box::new(Secp256k1Verifier::new()))
    }

    /// Create a context with a custom verifier
    pub fn with_verifier(
        owner: Address,
        key: PublicKey,
        verifier: Box<dyn SignatureVerifier>,
    ) -> Result<Self> {
        key.validate()?;
        Ok(Self {
            owner,
            verifier,
            trusted_key: RwLock::new(key),
        })
    }

    /// Address allowed to rotate the key
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Currently trusted key
    pub fn trusted_key(&self) -> PublicKey {
        *self.trusted_key.read()
    }

    /// Replace the trusted key
    ///
    /// Only the owner may rotate. The new key must be on the curve.
    pub fn rotate_key(&self, caller: Address, key: PublicKey) -> Result<()> {
        if caller != self.owner {
            warn!(%caller, "Rejected key rotation from non-owner");
            return Err(Error::NotOwner);
        }
        key.validate()?;

        *self.trusted_key.write() = key;
        info!(x = %key.x, "Rotated trusted key");
        Ok(())
    }
}

impl SignatureAuthority for VerifierContext {
    fn validate_signature(&self, hash: &B256, r: &B256, s: &B256) -> bool {
        let key = self.trusted_key();
        let valid = self.verifier.verify(hash, r, s, &key);
        debug!(%hash, valid, "Validated signature against trusted key");
        valid
    }
}

impl fmt::Debug for VerifierContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifierContext")
            .field("owner", &self.owner)
            .field("trusted_key", &self.trusted_key())
            .finish()
    }
}
