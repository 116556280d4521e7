//! Smart account state machine
//!
//! An account holds native funds on the [`Ledger`] and is controlled by a
//! fixed set of secp256k1 signers. Every validated operation must carry:
//!
//! - the next expected `sequence`
//! - at least `threshold` signatures from distinct registered signers
//! - a proof `sha256(message_hash || payload)` binding the signatures to the
//!   exact payload bytes
//!
//! Validated operations are reachable only through the entry point. The
//! recovery party (or the entry point) may also call [`Account::execute_direct`],
//! which skips signatures and leaves the sequence untouched.
//!
//! All operations are associated functions over `&mut Ledger` because the
//! account state lives in the ledger and the calls it performs need the
//! ledger too.

pub mod authorization;

pub use authorization::{Authorization, Comparison, DailySpend, Predicate};

use crate::crypto::SignatureVerifier;
use crate::ledger::{Event, Ledger};
use crate::types::{Call, PublicKey, SignerSignature, keccak256_hash, origin_binding, proof_hash};
use crate::{Error, Result};
use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Threshold-signed operation addressed to an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedOperation {
    /// Hash every signer signed
    pub message_hash: B256,
    /// `sha256(message_hash || payload)`
    pub proof: B256,
    /// Expected account sequence
    pub sequence: u64,
    /// Signatures, each with the key it claims
    pub signatures: Vec<SignerSignature>,
}

/// Account state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    recovery: Address,
    entry_point: Address,
    signers: Vec<PublicKey>,
    threshold: u64,
    origin_binding: B256,
    sequence: u64,
    authorizations: HashMap<B256, Authorization>,
}

impl Account {
    /// Create account state
    ///
    /// The signer set must be non-empty, free of duplicates and on the curve,
    /// with `1 <= threshold <= signers.len()`.
    pub fn new(
        recovery: Address,
        entry_point: Address,
        signers: Vec<PublicKey>,
        threshold: u64,
        origin_binding: B256,
    ) -> Result<Self> {
        validate_signer_set(&signers, threshold)?;
        Ok(Self {
            recovery,
            entry_point,
            signers,
            threshold,
            origin_binding,
            sequence: 0,
            authorizations: HashMap::new(),
        })
    }

    /// Party allowed to execute directly
    pub fn recovery(&self) -> Address {
        self.recovery
    }

    /// Router allowed to submit validated operations
    pub fn entry_point(&self) -> Address {
        self.entry_point
    }

    /// Registered signers, in registration order
    pub fn signers(&self) -> &[PublicKey] {
        &self.signers
    }

    /// Required number of distinct signatures
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Hash of the foreign address that created the account
    pub fn origin_binding(&self) -> B256 {
        self.origin_binding
    }

    /// Next expected sequence
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Stored authorization
    pub fn authorization(&self, id: &B256) -> Option<&Authorization> {
        self.authorizations.get(id)
    }

    /// Number of stored authorizations
    pub fn authorization_count(&self) -> usize {
        self.authorizations.len()
    }

    /// Position of `key` in the signer set
    pub fn signer_index(&self, key: &PublicKey) -> Option<usize> {
        self.signers.iter().position(|s| s == key)
    }

    fn ensure_entry_point(&self, caller: Address) -> Result<()> {
        if caller != self.entry_point {
            warn!(%caller, "Rejected call from non entry point");
            return Err(Error::NotEntryPoint);
        }
        Ok(())
    }

    fn ensure_origin(&self, source_address: &str) -> Result<()> {
        if origin_binding(source_address) != self.origin_binding {
            warn!(source_address, "Source address does not match origin binding");
            return Err(Error::OriginMismatch);
        }
        Ok(())
    }

    /// Check a signed operation against the account without changing state
    ///
    /// Checks run in a fixed order: sequence, signature count, signer
    /// membership and uniqueness, signature validity, proof.
    pub fn validate_operation(
        &self,
        verifier: &dyn SignatureVerifier,
        op: &SignedOperation,
        payload: &[u8],
    ) -> Result<()> {
        if op.sequence != self.sequence {
            return Err(Error::SequenceMismatch {
                expected: self.sequence,
                actual: op.sequence,
            });
        }

        let supplied = op.signatures.len() as u64;
        if supplied < self.threshold {
            return Err(Error::ThresholdNotMet {
                required: self.threshold,
                actual: supplied,
            });
        }

        let mut used = vec![false; self.signers.len()];
        for (position, sig) in op.signatures.iter().enumerate() {
            let index = self
                .signer_index(&sig.public_key)
                .ok_or_else(|| Error::UnknownSigner(sig.public_key.to_string()))?;
            if used[index] {
                return Err(Error::DuplicateSigner(position));
            }
            used[index] = true;
        }

        for (position, sig) in op.signatures.iter().enumerate() {
            if !verifier.verify(&op.message_hash, &sig.r, &sig.s, &sig.public_key) {
                debug!(position, "Signature failed verification");
                return Err(Error::InvalidSignature(position));
            }
        }

        if proof_hash(&op.message_hash, payload) != op.proof {
            return Err(Error::InvalidProof);
        }

        Ok(())
    }

    fn load<'a>(ledger: &'a Ledger, address: &Address) -> Result<&'a Account> {
        ledger
            .account(address)
            .ok_or(Error::AccountNotFound(*address))
    }

    fn load_mut<'a>(ledger: &'a mut Ledger, address: &Address) -> Result<&'a mut Account> {
        ledger
            .account_mut(address)
            .ok_or(Error::AccountNotFound(*address))
    }

    /// Perform a call from the account and record it
    fn perform(ledger: &mut Ledger, address: Address, call: &Call) -> Result<Vec<u8>> {
        let output = ledger.dispatch(address, call)?;
        ledger.emit(Event::TransactionExecuted {
            account: address,
            target: call.target,
            value: call.value,
            data: call.data.clone(),
        });
        Ok(output)
    }

    /// Validate a signed operation and perform the call in `payload`
    ///
    /// The sequence advances only if the call succeeds.
    pub fn execute_validated(
        ledger: &mut Ledger,
        verifier: &dyn SignatureVerifier,
        caller: Address,
        address: Address,
        source_address: &str,
        op: &SignedOperation,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        ledger.transact(|ledger| {
            let account = Self::load(ledger, &address)?;
            account.ensure_entry_point(caller)?;
            account.ensure_origin(source_address)?;
            account.validate_operation(verifier, op, payload)?;
            let call = Call::decode(payload)?;

            let account = Self::load_mut(ledger, &address)?;
            account.sequence += 1;
            let sequence = account.sequence;

            let output = Self::perform(ledger, address, &call)?;
            info!(
                account = %address,
                target = %call.target,
                value = %call.value,
                sequence,
                "Executed validated transaction"
            );
            Ok(output)
        })
    }

    /// Validate a signed operation and store an authorization grant
    ///
    /// The grant is stored under `keccak256(message_hash)` and consumes one
    /// sequence number. `payload` is only bound by the proof.
    #[allow(clippy::too_many_arguments)]
    pub fn create_authorization(
        ledger: &mut Ledger,
        verifier: &dyn SignatureVerifier,
        caller: Address,
        address: Address,
        source_address: &str,
        op: &SignedOperation,
        expiry: i64,
        predicates: Vec<Predicate>,
        payload: &[u8],
    ) -> Result<B256> {
        ledger.transact(|ledger| {
            let account = Self::load(ledger, &address)?;
            account.ensure_entry_point(caller)?;
            account.ensure_origin(source_address)?;
            account.validate_operation(verifier, op, payload)?;

            let id = authorization_id(&op.message_hash);
            if account.authorizations.contains_key(&id) {
                return Err(Error::AuthorizationExists(id));
            }
            let authorization = Authorization::new(expiry, predicates)?;
            let rules = authorization.predicates().len();

            let account = Self::load_mut(ledger, &address)?;
            account.authorizations.insert(id, authorization);
            account.sequence += 1;

            ledger.emit(Event::AuthorizationCreated {
                account: address,
                authorization_id: id,
                expiry,
            });
            info!(account = %address, authorization = %id, expiry, rules, "Created authorization");
            Ok(id)
        })
    }

    /// Perform the call in `payload` under a stored authorization
    pub fn execute_authorized(
        ledger: &mut Ledger,
        caller: Address,
        address: Address,
        source_address: &str,
        authorization_id: B256,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        ledger.transact(|ledger| {
            let now = ledger.timestamp();
            let today = ledger.today()?;

            let account = Self::load(ledger, &address)?;
            account.ensure_entry_point(caller)?;
            account.ensure_origin(source_address)?;
            let call = Call::decode(payload)?;

            let authorization = account
                .authorizations
                .get(&authorization_id)
                .ok_or(Error::AuthorizationNotFound(authorization_id))?;
            let updates = authorization.evaluate(payload, now, today)?;

            let account = Self::load_mut(ledger, &address)?;
            if let Some(authorization) = account.authorizations.get_mut(&authorization_id) {
                authorization.record(updates);
            }

            let output = Self::perform(ledger, address, &call)?;
            ledger.emit(Event::AuthorizedExecution {
                account: address,
                authorization_id,
            });
            info!(
                account = %address,
                authorization = %authorization_id,
                target = %call.target,
                value = %call.value,
                "Executed authorized transaction"
            );
            Ok(output)
        })
    }

    /// Perform a call without signatures
    ///
    /// Only the recovery party or the entry point may call this.
    pub fn execute_direct(
        ledger: &mut Ledger,
        caller: Address,
        address: Address,
        call: &Call,
    ) -> Result<Vec<u8>> {
        ledger.transact(|ledger| {
            let account = Self::load(ledger, &address)?;
            if caller != account.recovery && caller != account.entry_point {
                warn!(%caller, account = %address, "Rejected direct execution");
                return Err(Error::NotEntryPointOrRecovery);
            }

            let output = Self::perform(ledger, address, call)?;
            info!(account = %address, %caller, target = %call.target, "Executed direct transaction");
            Ok(output)
        })
    }
}

/// Identifier under which an authorization is stored
pub fn authorization_id(message_hash: &B256) -> B256 {
    B256::from(keccak256_hash(message_hash.as_slice()))
}

/// Check signer set shape and threshold bounds
pub(crate) fn validate_signer_set(signers: &[PublicKey], threshold: u64) -> Result<()> {
    if signers.is_empty() {
        return Err(Error::InvalidConfig("signer set is empty".into()));
    }
    if threshold == 0 || threshold > signers.len() as u64 {
        return Err(Error::InvalidConfig(format!(
            "threshold {} outside 1..={}",
            threshold,
            signers.len()
        )));
    }
    for (i, signer) in signers.iter().enumerate() {
        signer.validate()?;
        if signers[..i].contains(signer) {
            return Err(Error::InvalidConfig(format!("signer {} listed twice", signer)));
        }
    }
    Ok(())
}
