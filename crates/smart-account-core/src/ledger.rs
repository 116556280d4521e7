//! In-process ledger that hosts accounts and foreign contracts
//!
//! The ledger provides the execution environment the protocol relies on:
//! native balances, a block clock, deployed account state, foreign contracts
//! and an append-only event log. Every public operation of the protocol runs
//! inside [`Ledger::transact`], which restores the previous state when the
//! operation fails, so a call either commits completely or not at all.

use crate::account::Account;
use crate::types::Call;
use crate::{Error, Result};
use alloy_primitives::{Address, B256, Bytes, U256};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, trace};

/// Context passed to a foreign contract when it is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Immediate caller
    pub caller: Address,
    /// Native value attached to the call (already credited)
    pub value: U256,
}

/// Foreign contract living on the ledger
///
/// Contracts receive the ledger mutably so they can move balances, emit
/// events or call further contracts. Returning an error reverts the whole
/// surrounding operation.
pub trait Contract: Send + Sync + fmt::Debug {
    /// Handle a call with raw call data
    fn call(&mut self, ledger: &mut Ledger, ctx: &CallContext, data: &[u8]) -> Result<Vec<u8>>;

    /// Clone into a box (used for transaction checkpoints)
    fn clone_box(&self) -> Box<dyn Contract>;

    /// Downcast support for inspecting contract state
    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn Contract> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Events recorded by protocol components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Account deployed by the factory
    AccountCreated {
        account: Address,
        recovery: Address,
        origin_binding: B256,
        threshold: u64,
        signer_count: usize,
    },
    /// Account performed a call
    TransactionExecuted {
        account: Address,
        target: Address,
        value: U256,
        data: Bytes,
    },
    /// Account stored a new authorization
    AuthorizationCreated {
        account: Address,
        authorization_id: B256,
        expiry: i64,
    },
    /// Call performed under an authorization
    AuthorizedExecution {
        account: Address,
        authorization_id: B256,
    },
    /// Entry point executor set changed
    ExecutorUpdated { executor: Address, enabled: bool },
    /// Gateway accepted a signed contract call
    ContractCallApproved {
        source_chain: String,
        source_address: String,
        destination: Address,
        tx_hash: B256,
    },
    /// Gateway delivered a contract call
    ContractCallExecuted {
        source_chain: String,
        source_address: String,
        destination: Address,
        tx_hash: B256,
    },
}

/// Ledger state
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    timestamp: i64,
    balances: HashMap<Address, U256>,
    accounts: HashMap<Address, Account>,
    contracts: HashMap<Address, Box<dyn Contract>>,
    events: Vec<Event>,
    executing: HashSet<Address>,
}

/// State captured at the start of [`Ledger::transact`]
///
/// The event log is append-only inside a transaction, so only its length is
/// recorded.
struct Checkpoint {
    timestamp: i64,
    balances: HashMap<Address, U256>,
    accounts: HashMap<Address, Account>,
    contracts: HashMap<Address, Box<dyn Contract>>,
    events_len: usize,
}

impl Ledger {
    /// Create an empty ledger at the given unix timestamp
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    // ============ Clock ============

    /// Current block timestamp (unix seconds)
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Set the block timestamp
    pub fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = timestamp;
    }

    /// Move the clock forward
    pub fn advance(&mut self, seconds: i64) {
        self.timestamp = self.timestamp.saturating_add(seconds);
    }

    /// UTC day containing the current timestamp
    pub fn today(&self) -> Result<NaiveDate> {
        DateTime::from_timestamp(self.timestamp, 0)
            .map(|t| t.date_naive())
            .ok_or_else(|| Error::InvalidConfig(format!("timestamp {} out of range", self.timestamp)))
    }

    // ============ Balances ============

    /// Native balance of an address
    pub fn balance_of(&self, address: &Address) -> U256 {
        self.balances.get(address).copied().unwrap_or_default()
    }

    /// Mint native value to an address
    pub fn fund(&mut self, address: Address, amount: U256) {
        let balance = self.balances.entry(address).or_default();
        *balance = balance.saturating_add(amount);
        debug!(%address, %amount, "Funded address");
    }

    /// All non-zero balances
    pub fn balances(&self) -> impl Iterator<Item = (&Address, &U256)> {
        self.balances.iter().filter(|(_, v)| !v.is_zero())
    }

    /// Move native value between addresses
    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let available = self.balance_of(&from);
        if available < amount {
            return Err(Error::InsufficientBalance {
                account: from,
                available,
                required: amount,
            });
        }
        self.balances.insert(from, available - amount);
        let to_balance = self.balances.entry(to).or_default();
        *to_balance = to_balance.saturating_add(amount);
        Ok(())
    }

    // ============ Accounts ============

    /// Look up a deployed account
    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    /// Look up a deployed account mutably
    pub fn account_mut(&mut self, address: &Address) -> Option<&mut Account> {
        self.accounts.get_mut(address)
    }

    /// Deploy account state at an address
    pub fn insert_account(&mut self, address: Address, account: Account) {
        self.accounts.insert(address, account);
    }

    /// All deployed accounts
    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }

    // ============ Contracts ============

    /// Deploy a foreign contract
    pub fn deploy_contract(&mut self, address: Address, contract: Box<dyn Contract>) {
        self.contracts.insert(address, contract);
    }

    /// Inspect a foreign contract by concrete type
    pub fn contract<T: 'static>(&self, address: &Address) -> Option<&T> {
        self.contracts
            .get(address)
            .and_then(|c| c.as_any().downcast_ref::<T>())
    }

    /// Whether code (an account or a contract) lives at the address
    pub fn has_code(&self, address: &Address) -> bool {
        self.accounts.contains_key(address) || self.contracts.contains_key(address)
    }

    // ============ Events ============

    /// Append an event
    pub fn emit(&mut self, event: Event) {
        trace!(?event, "Emitted event");
        self.events.push(event);
    }

    /// Events emitted so far
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    // ============ Execution ============

    /// Run `f` atomically
    ///
    /// On error every change made by `f` (balances, accounts, contracts,
    /// events, clock) is discarded.
    pub fn transact<T>(&mut self, f: impl FnOnce(&mut Ledger) -> Result<T>) -> Result<T> {
        let checkpoint = self.checkpoint();
        match f(self) {
            Ok(value) => Ok(value),
            Err(e) => {
                debug!(error = %e, "Reverted ledger transaction");
                self.restore(checkpoint);
                Err(e)
            }
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            timestamp: self.timestamp,
            balances: self.balances.clone(),
            accounts: self.accounts.clone(),
            contracts: self.contracts.clone(),
            events_len: self.events.len(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.timestamp = checkpoint.timestamp;
        self.balances = checkpoint.balances;
        self.accounts = checkpoint.accounts;
        self.contracts = checkpoint.contracts;
        self.events.truncate(checkpoint.events_len);
    }

    /// Perform `call` on behalf of `from`
    ///
    /// Value moves first; if a contract is deployed at the target it is then
    /// invoked with the call data. Calls to plain addresses and accounts only
    /// move value. A contract that is already executing cannot be entered
    /// again. Any failure surfaces as [`Error::CallFailed`].
    pub fn dispatch(&mut self, from: Address, call: &Call) -> Result<Vec<u8>> {
        if self.executing.contains(&call.target) {
            return Err(Error::CallFailed {
                target: call.target,
                reason: "reentrant call".into(),
            });
        }

        self.transact(|ledger| {
            ledger
                .transfer(from, call.target, call.value)
                .map_err(|e| Error::CallFailed {
                    target: call.target,
                    reason: e.to_string(),
                })?;

            let Some(mut contract) = ledger.contracts.remove(&call.target) else {
                return Ok(Vec::new());
            };

            let ctx = CallContext {
                caller: from,
                value: call.value,
            };
            ledger.executing.insert(call.target);
            let result = contract.call(ledger, &ctx, &call.data);
            ledger.executing.remove(&call.target);
            ledger.contracts.insert(call.target, contract);

            result.map_err(|e| Error::CallFailed {
                target: call.target,
                reason: e.to_string(),
            })
        })
    }
}
