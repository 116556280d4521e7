//! # Smart Account Core
//!
//! Cross-chain smart accounts controlled by secp256k1 threshold signatures.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **Signature Verification**: Self-contained secp256k1 ECDSA verifier and
//!   an owner-managed registry for a trusted MPC key
//! - **Account Factory**: Deterministic, idempotent account deployment keyed
//!   by signer set, origin binding and threshold
//! - **Smart Accounts**: M-of-N signed operations with strict sequencing,
//!   proof binding and predicate-based authorizations (equality, upper
//!   bound, daily spending cap)
//! - **Entry Point**: Router for cross-chain commands arriving through an
//!   approving messaging channel or a trusted executor
//! - **MPC Gateway**: Replay-protected forwarding of calls signed by the MPC key
//! - **Persistence**: JSON snapshots of ledger and gateway state
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use smart_account_core::{DeploymentConfig, InMemoryChannel, Ledger};
//!
//! let config = DeploymentConfig::new();
//! let channel = InMemoryChannel::new();
//! let mut ledger = Ledger::new(1_700_000_000);
//! let mut entry_point = config.build_entry_point(&mut ledger, Box::new(channel.clone()))?;
//!
//! // A relay delivers an approved command from another chain
//! channel.approve_payload(command_id, "neutron", source_address, &payload);
//! let outcome = entry_point.execute(&mut ledger, command_id, "neutron", source_address, &payload)?;
//! ```
//!
//! ## Security Model
//!
//! - Every account operation needs `threshold` distinct signer signatures
//!   over a message hash that is bound to the payload by a sha256 proof
//! - Sequences advance only on success, so a signed operation runs once
//! - Accounts only accept commands from the source address they were
//!   created for
//! - All state changes happen inside [`Ledger::transact`] and revert as a unit

pub mod account;
pub mod config;
pub mod crypto;
pub mod entry_point;
pub mod error;
pub mod factory;
pub mod gateway;
pub mod ledger;
pub mod storage;
pub mod types;

pub use account::{Account, Authorization, Comparison, Predicate, SignedOperation};
pub use config::DeploymentConfig;
pub use crypto::{Secp256k1Verifier, SignatureAuthority, SignatureVerifier, VerifierContext};
pub use entry_point::{
    Command, CommandOutcome, EntryPoint, InMemoryChannel, MessageChannel, MessageReceiver,
};
pub use error::{Error, ErrorKind, Result};
pub use factory::{AccountFactory, AccountKey, BootstrapProof};
pub use gateway::{ContractCallRequest, MpcGateway, generate_tx_hash};
pub use ledger::{CallContext, Contract, Event, Ledger};
pub use storage::{FileSystemStore, GatewaySnapshot, LedgerSnapshot, MemoryStateStore, StateStore};
pub use types::{
    Call, PublicKey, SignerSignature, keccak256_hash, origin_binding, proof_hash, sha256_hash,
};

#[cfg(feature = "signer")]
pub use crypto::LocalSigner;
