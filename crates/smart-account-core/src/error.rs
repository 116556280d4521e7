//! Error types for smart account operations
//!
//! Every failure aborts the whole call: nothing is partially committed and
//! nothing is retried internally. [`Error::kind`] groups the variants so a
//! relay can tell "already happened" apart from "never valid".

use alloy_primitives::{Address, B256, U256};
use thiserror::Error;

/// Result type alias for smart account operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown command tag or malformed payload
    Structural,
    /// Bad signature, unmet threshold, proof mismatch, unapproved message
    Authentication,
    /// Sequence mismatch or hash already executed
    Replay,
    /// Authorization used after its expiry
    AuthorizationExpired,
    /// Authorized call outside the granted scope
    PredicateViolation,
    /// The finally invoked call failed
    DownstreamCallFailure,
    /// Caller is not allowed to invoke the operation
    AuthorizationDenied,
    /// Invalid deployment or account parameters
    Configuration,
    /// Persistence failure
    Storage,
}

/// Errors that can occur during smart account operations
#[derive(Debug, Error)]
pub enum Error {
    // ============ Structural Errors ============
    /// Command tag not recognised by the router
    #[error("Unknown command tag: {0}")]
    UnknownCommand(u8),

    /// Payload too short or carrying out-of-range fields
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Point is not a valid secp256k1 public key
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Predicate rule cannot be interpreted
    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),

    // ============ Configuration Errors ============
    /// Invalid account or deployment configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Key material could not be loaded or used
    #[error("Signing error: {0}")]
    Signing(String),

    // ============ Authentication Errors ============
    /// Not enough signatures supplied
    #[error("Threshold not met: required {required}, got {actual}")]
    ThresholdNotMet { required: u64, actual: u64 },

    /// Supplied key is not part of the signer set
    #[error("Signer not registered: {0}")]
    UnknownSigner(String),

    /// Same signer counted twice
    #[error("Signer {0} used more than once")]
    DuplicateSigner(usize),

    /// Signature at the given position failed verification
    #[error("Invalid signature at position {0}")]
    InvalidSignature(usize),

    /// Proof does not bind the message hash to the payload
    #[error("Invalid proof")]
    InvalidProof,

    /// Source address does not match the account's origin binding
    #[error("Origin does not match account binding")]
    OriginMismatch,

    /// Messaging channel did not confirm the command
    #[error("Message not approved by gateway")]
    MessageNotApproved,

    // ============ Replay Errors ============
    /// Sequence is not the next expected value
    #[error("Sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch { expected: u64, actual: u64 },

    /// Authorization identifier already in use
    #[error("Authorization already exists: {0}")]
    AuthorizationExists(B256),

    /// Gateway call already executed
    #[error("Transaction already executed: {0}")]
    TransactionAlreadyExecuted(B256),

    // ============ Authorization Errors ============
    /// No authorization stored under the identifier
    #[error("Authorization not found: {0}")]
    AuthorizationNotFound(B256),

    /// Authorization is past its expiry
    #[error("Authorization expired at {expiry} (now {now})")]
    AuthorizationExpired { expiry: i64, now: i64 },

    /// Rule of an authorization rejected the payload
    #[error("Predicate {index} violated: {reason}")]
    PredicateViolation { index: usize, reason: String },

    // ============ Downstream Errors ============
    /// Invoked call reverted
    #[error("Call to {target} failed: {reason}")]
    CallFailed { target: Address, reason: String },

    /// Not enough native balance to move value
    #[error("Insufficient balance on {account}: have {available}, need {required}")]
    InsufficientBalance {
        account: Address,
        available: U256,
        required: U256,
    },

    /// Gateway destination call failed
    #[error("Transaction {tx_hash} failed: {reason}")]
    TransactionFailed { tx_hash: B256, reason: String },

    /// Gateway signature not approved
    #[error("Transaction not approved: {0}")]
    TransactionNotApproved(B256),

    // ============ Access Errors ============
    /// Operation reserved for the entry point
    #[error("Caller is not the entry point")]
    NotEntryPoint,

    /// Operation reserved for the entry point or the recovery party
    #[error("Caller is not the entry point or recovery party")]
    NotEntryPointOrRecovery,

    /// Operation reserved for the owner
    #[error("Caller is not the owner")]
    NotOwner,

    /// Caller is neither owner nor executor
    #[error("Caller is not an executor: {0}")]
    NotExecutor(Address),

    /// No account deployed at the address
    #[error("Account not found: {0}")]
    AccountNotFound(Address),

    // ============ Storage Errors ============
    /// Storage operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownCommand(_)
            | Error::MalformedPayload(_)
            | Error::InvalidPublicKey(_)
            | Error::InvalidPredicate(_)
            | Error::AccountNotFound(_) => ErrorKind::Structural,
            Error::InvalidConfig(_) | Error::Signing(_) => ErrorKind::Configuration,
            Error::ThresholdNotMet { .. }
            | Error::UnknownSigner(_)
            | Error::DuplicateSigner(_)
            | Error::InvalidSignature(_)
            | Error::InvalidProof
            | Error::OriginMismatch
            | Error::MessageNotApproved
            | Error::TransactionNotApproved(_) => ErrorKind::Authentication,
            Error::SequenceMismatch { .. }
            | Error::AuthorizationExists(_)
            | Error::TransactionAlreadyExecuted(_) => ErrorKind::Replay,
            Error::AuthorizationNotFound(_) | Error::PredicateViolation { .. } => {
                ErrorKind::PredicateViolation
            }
            Error::AuthorizationExpired { .. } => ErrorKind::AuthorizationExpired,
            Error::CallFailed { .. }
            | Error::InsufficientBalance { .. }
            | Error::TransactionFailed { .. } => ErrorKind::DownstreamCallFailure,
            Error::NotEntryPoint
            | Error::NotEntryPointOrRecovery
            | Error::NotOwner
            | Error::NotExecutor(_) => ErrorKind::AuthorizationDenied,
            Error::Storage(_) | Error::Serialization(_) | Error::Io(_) => ErrorKind::Storage,
        }
    }

    /// Check whether the error means the request was already processed
    pub fn is_replay(&self) -> bool {
        self.kind() == ErrorKind::Replay
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::MalformedPayload(e.to_string())
    }
}
