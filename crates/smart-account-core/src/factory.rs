//! Deterministic account deployment
//!
//! Account addresses are derived CREATE2-style from the signer set, the
//! origin binding and the threshold, so the same key material always maps to
//! the same account and creating it twice returns the existing address.
//!
//! ```text
//! salt    = keccak256(X1 || Y1 || ... || Xn || Yn || originBinding || threshold)
//! address = keccak256(0xff || factory || salt || keccak256(entryPoint))[12..]
//! ```

use crate::account::{Account, validate_signer_set};
use crate::crypto::{Secp256k1Verifier, SignatureVerifier};
use crate::ledger::{Event, Ledger};
use crate::types::PublicKey;
use crate::{Error, Result};
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tiny_keccak::{Hasher, Keccak};
use tracing::{debug, info, warn};

/// Registry key of an account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountKey {
    /// Ordered signer set
    pub signers: Vec<PublicKey>,
    /// Hash of the creating foreign address
    pub origin_binding: B256,
    /// Required signatures
    pub threshold: u64,
}

impl AccountKey {
    /// Create a registry key
    pub fn new(signers: Vec<PublicKey>, origin_binding: B256, threshold: u64) -> Self {
        Self {
            signers,
            origin_binding,
            threshold,
        }
    }

    /// Registry key of existing account state
    pub fn of(account: &Account) -> Self {
        Self::new(
            account.signers().to_vec(),
            account.origin_binding(),
            account.threshold(),
        )
    }

    /// CREATE2 salt for the key
    pub fn salt(&self) -> B256 {
        let mut hasher = Keccak::v256();
        for signer in &self.signers {
            hasher.update(signer.x.as_slice());
            hasher.update(signer.y.as_slice());
        }
        hasher.update(self.origin_binding.as_slice());
        hasher.update(&U256::from(self.threshold).to_be_bytes::<32>());

        let mut salt = [0u8; 32];
        hasher.finalize(&mut salt);
        B256::from(salt)
    }
}

/// Signature proving control of the first signer at creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapProof {
    /// Signed hash
    pub message_hash: B256,
    /// R component
    pub r: B256,
    /// S component
    pub s: B256,
}

/// Registry entry held back until the deploying transaction commits
#[derive(Debug)]
pub(crate) struct PendingRegistration {
    key: AccountKey,
    address: Address,
}

/// Account factory and registry
#[derive(Debug)]
pub struct AccountFactory {
    address: Address,
    entry_point: Address,
    verifier: Box<dyn SignatureVerifier>,
    accounts: HashMap<AccountKey, Address>,
    by_signer: HashMap<PublicKey, Vec<Address>>,
}

impl AccountFactory {
    /// Create a factory deploying accounts routed through `entry_point`
    pub fn new(address: Address, entry_point: Address) -> Self {
        Self::with_verifier(address, entry_point, Box::new(Secp256k1Verifier::new()))
    }

    /// Create a factory with a custom verifier for bootstrap proofs
    pub fn with_verifier(
        address: Address,
        entry_point: Address,
        verifier: Box<dyn SignatureVerifier>,
    ) -> Self {
        Self {
            address,
            entry_point,
            verifier,
            accounts: HashMap::new(),
            by_signer: HashMap::new(),
        }
    }

    /// Factory address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Entry point of deployed accounts
    pub fn entry_point(&self) -> Address {
        self.entry_point
    }

    /// Address an account with `key` has (or would have)
    pub fn compute_address(&self, key: &AccountKey) -> Address {
        let mut init_hash = [0u8; 32];
        let mut hasher = Keccak::v256();
        hasher.update(self.entry_point.into_word().as_slice());
        hasher.finalize(&mut init_hash);

        // CREATE2: 0xff || factory || salt || keccak256(initContext)
        let mut hasher = Keccak::v256();
        hasher.update(&[0xff]);
        hasher.update(self.address.as_slice());
        hasher.update(key.salt().as_slice());
        hasher.update(&init_hash);

        let mut hash = [0u8; 32];
        hasher.finalize(&mut hash);
        Address::from_slice(&hash[12..])
    }

    /// Deploy an account, or return the existing one for the same key
    pub fn create_account(
        &mut self,
        ledger: &mut Ledger,
        recovery: Address,
        key: AccountKey,
        bootstrap: Option<&BootstrapProof>,
    ) -> Result<Address> {
        let (address, pending) = self.deploy(ledger, recovery, key, bootstrap)?;
        if let Some(pending) = pending {
            self.register(pending);
        }
        Ok(address)
    }

    /// Deploy account state without touching the registry
    ///
    /// Returns the registry entry to record once the surrounding ledger
    /// transaction has committed, or `None` if the key is already registered.
    pub(crate) fn deploy(
        &self,
        ledger: &mut Ledger,
        recovery: Address,
        key: AccountKey,
        bootstrap: Option<&BootstrapProof>,
    ) -> Result<(Address, Option<PendingRegistration>)> {
        validate_signer_set(&key.signers, key.threshold)?;

        if let Some(proof) = bootstrap {
            let first = &key.signers[0];
            if !self.verifier.verify(&proof.message_hash, &proof.r, &proof.s, first) {
                warn!(signer = %first, "Bootstrap signature rejected");
                return Err(Error::InvalidSignature(0));
            }
        }

        if let Some(existing) = self.accounts.get(&key)
            && ledger.account(existing).is_some()
        {
            debug!(account = %existing, "Account already registered");
            return Ok((*existing, None));
        }

        let address = self.compute_address(&key);
        if ledger.account(&address).is_some() {
            debug!(account = %address, "Account already deployed, registering");
            return Ok((address, Some(PendingRegistration { key, address })));
        }
        if ledger.has_code(&address) {
            return Err(Error::InvalidConfig(format!(
                "address {} is occupied by a contract",
                address
            )));
        }

        let account = Account::new(
            recovery,
            self.entry_point,
            key.signers.clone(),
            key.threshold,
            key.origin_binding,
        )?;

        ledger.transact(|ledger| {
            ledger.insert_account(address, account);
            ledger.emit(Event::AccountCreated {
                account: address,
                recovery,
                origin_binding: key.origin_binding,
                threshold: key.threshold,
                signer_count: key.signers.len(),
            });
            Ok(())
        })?;

        info!(
            account = %address,
            %recovery,
            signers = key.signers.len(),
            threshold = key.threshold,
            "Created account"
        );
        Ok((address, Some(PendingRegistration { key, address })))
    }

    /// Record a deployment in the registry
    pub(crate) fn register(&mut self, pending: PendingRegistration) {
        let PendingRegistration { key, address } = pending;
        for signer in &key.signers {
            let accounts = self.by_signer.entry(*signer).or_default();
            if !accounts.contains(&address) {
                accounts.push(address);
            }
        }
        self.accounts.insert(key, address);
    }

    /// Registered account for `key`
    pub fn get_account(&self, key: &AccountKey) -> Option<Address> {
        self.accounts.get(key).copied()
    }

    /// Every registered account whose signer set contains `signer`
    pub fn get_accounts(&self, signer: &PublicKey) -> &[Address] {
        self.by_signer
            .get(signer)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of registered accounts
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Rebuild the registry from accounts deployed on `ledger`
    ///
    /// Only accounts whose address matches this factory's derivation are
    /// registered. Returns how many were found.
    pub fn reindex(&mut self, ledger: &Ledger) -> usize {
        let found: Vec<PendingRegistration> = ledger
            .accounts()
            .filter(|(_, account)| account.entry_point() == self.entry_point)
            .map(|(address, account)| PendingRegistration {
                key: AccountKey::of(account),
                address: *address,
            })
            .filter(|pending| self.compute_address(&pending.key) == pending.address)
            .collect();

        let count = found.len();
        for pending in found {
            self.register(pending);
        }
        info!(factory = %self.address, count, "Reindexed accounts");
        count
    }
}
