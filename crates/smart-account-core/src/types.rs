//! Core types for cross-chain smart accounts
//!
//! This module defines the values that flow through every component:
//! signer public keys as raw curve coordinates, per-signer signatures,
//! the decoded call carried by a transaction payload, and the hash helpers
//! used for proofs and origin bindings.

use crate::crypto::curve;
use crate::{Error, Result};
use alloy_primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Size of one encoded field
pub const WORD_LEN: usize = 32;

/// Uncompressed secp256k1 public key given by its affine coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey {
    /// X coordinate (big-endian)
    pub x: B256,
    /// Y coordinate (big-endian)
    pub y: B256,
}

impl PublicKey {
    /// Create a public key from raw coordinates without validation
    pub const fn new(x: B256, y: B256) -> Self {
        Self { x, y }
    }

    /// Create a public key, rejecting points that are not on the curve
    pub fn from_coordinates(x: B256, y: B256) -> Result<Self> {
        let key = Self::new(x, y);
        key.validate()?;
        Ok(key)
    }

    /// Parse from an uncompressed SEC1 encoding (`0x04 || X || Y`)
    pub fn from_sec1_uncompressed(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 65 || bytes[0] != 0x04 {
            return Err(Error::InvalidPublicKey(
                "expected 65-byte uncompressed point".into(),
            ));
        }
        Self::from_coordinates(B256::from_slice(&bytes[1..33]), B256::from_slice(&bytes[33..]))
    }

    /// Check that the point is on secp256k1 and is not the identity
    pub fn validate(&self) -> Result<()> {
        let x = U256::from_be_bytes(self.x.0);
        let y = U256::from_be_bytes(self.y.0);
        if curve::is_on_curve(x, y) {
            Ok(())
        } else {
            Err(Error::InvalidPublicKey(format!("{} is not on secp256k1", self)))
        }
    }

    /// Whether the point is on the curve
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Uncompressed SEC1 encoding (`0x04 || X || Y`)
    pub fn to_sec1_uncompressed(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[0] = 0x04;
        bytes[1..33].copy_from_slice(self.x.as_slice());
        bytes[33..].copy_from_slice(self.y.as_slice());
        bytes
    }

    /// Ethereum-style address of the key (last 20 bytes of keccak256(X || Y))
    pub fn eth_address(&self) -> Address {
        let hash = keccak256_hash(&self.to_sec1_uncompressed()[1..]);
        Address::from_slice(&hash[12..])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// ECDSA signature from one signer, together with the key it claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSignature {
    /// R component
    pub r: B256,
    /// S component
    pub s: B256,
    /// Public key the signature is checked against
    pub public_key: PublicKey,
}

impl SignerSignature {
    /// Create a new signer signature
    pub const fn new(r: B256, s: B256, public_key: PublicKey) -> Self {
        Self { r, s, public_key }
    }
}

/// Call described by a transaction payload
///
/// Encoded as `target (word, right-aligned) || value (word) || data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    /// Account or contract being invoked
    pub target: Address,
    /// Native value moved with the call
    pub value: U256,
    /// Raw call data (empty for plain transfers)
    pub data: Bytes,
}

impl Call {
    /// Offset of the target word inside a payload
    pub const TARGET_OFFSET: usize = 0;
    /// Offset of the value word inside a payload
    pub const VALUE_OFFSET: usize = WORD_LEN;
    /// Offset where raw call data starts
    pub const DATA_OFFSET: usize = 2 * WORD_LEN;

    /// Plain value transfer
    pub fn transfer(target: Address, value: U256) -> Self {
        Self {
            target,
            value,
            data: Bytes::new(),
        }
    }

    /// Contract call with data
    pub fn new(target: Address, value: U256, data: impl Into<Bytes>) -> Self {
        Self {
            target,
            value,
            data: data.into(),
        }
    }

    /// Decode a transaction payload
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::DATA_OFFSET {
            return Err(Error::MalformedPayload(format!(
                "transaction payload is {} bytes, need at least {}",
                payload.len(),
                Self::DATA_OFFSET
            )));
        }

        let target = word_to_address(&payload[Self::TARGET_OFFSET..Self::VALUE_OFFSET])?;
        let value = U256::from_be_slice(&payload[Self::VALUE_OFFSET..Self::DATA_OFFSET]);
        let data = Bytes::copy_from_slice(&payload[Self::DATA_OFFSET..]);

        Ok(Self {
            target,
            value,
            data,
        })
    }

    /// Encode as a transaction payload
    pub fn encode(&self) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(Self::DATA_OFFSET + self.data.len());
        encoded.extend_from_slice(self.target.into_word().as_slice());
        encoded.extend_from_slice(&self.value.to_be_bytes::<32>());
        encoded.extend_from_slice(&self.data);
        encoded
    }
}

/// Read a right-aligned address from a 32-byte word
///
/// The 12 padding bytes must be zero.
pub fn word_to_address(word: &[u8]) -> Result<Address> {
    if word.len() != WORD_LEN {
        return Err(Error::MalformedPayload(format!(
            "address word must be {} bytes, got {}",
            WORD_LEN,
            word.len()
        )));
    }
    if word[..12].iter().any(|b| *b != 0) {
        return Err(Error::MalformedPayload(format!(
            "address word has dirty padding: 0x{}",
            hex::encode(word)
        )));
    }
    Ok(Address::from_slice(&word[12..]))
}

/// Compute Keccak256 hash of data
pub fn keccak256_hash(data: &[u8]) -> [u8; 32] {
    use tiny_keccak::{Hasher, Keccak};
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    hash
}

/// Compute SHA-256 hash of data
pub fn sha256_hash(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Proof binding a signed message hash to the exact payload bytes
///
/// `sha256(message_hash || payload)`
pub fn proof_hash(message_hash: &B256, payload: &[u8]) -> B256 {
    let mut hasher = Sha256::new();
    hasher.update(message_hash.as_slice());
    hasher.update(payload);
    B256::from(<[u8; 32]>::from(hasher.finalize()))
}

/// Origin binding for a foreign-chain source address
///
/// `keccak256(utf8(source_address))`
pub fn origin_binding(source_address: &str) -> B256 {
    B256::from(keccak256_hash(source_address.as_bytes()))
}
