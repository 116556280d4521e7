//! Entry point: routes cross-chain commands to the factory and accounts
//!
//! Messages arrive either through [`EntryPoint::execute`], which requires the
//! messaging channel to approve the exact `(commandId, sourceChain,
//! sourceAddress, keccak256(payload))` tuple, or through
//! [`EntryPoint::execute_payload`], which trusts the caller instead (the
//! owner or a registered executor such as the MPC gateway).
//!
//! A command either commits completely or leaves no trace: the channel
//! approval is consumed only when the command succeeds.

pub mod channel;
pub mod codec;

pub use channel::{InMemoryChannel, MessageChannel};
pub use codec::Command;

use crate::account::Account;
use crate::crypto::{Secp256k1Verifier, SignatureVerifier};
use crate::factory::{AccountFactory, AccountKey, PendingRegistration};
use crate::ledger::{Event, Ledger};
use crate::types::{Call, keccak256_hash, origin_binding};
use crate::{Error, Result};
use alloy_primitives::{Address, B256};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Component that accepts forwarded cross-chain messages
pub trait MessageReceiver {
    /// Address of the receiver
    fn address(&self) -> Address;

    /// Handle a message forwarded by `caller`
    fn receive_message(
        &mut self,
        ledger: &mut Ledger,
        caller: Address,
        source_chain: &str,
        source_address: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>>;
}

/// Result of a routed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Account deployed or already present
    AccountCreated(Address),
    /// Validated call performed
    Executed { account: Address, output: Vec<u8> },
    /// Authorization stored
    AuthorizationCreated {
        account: Address,
        authorization_id: B256,
    },
    /// Call under authorization performed
    AuthorizedExecuted { account: Address, output: Vec<u8> },
}

impl CommandOutcome {
    /// Return data of the outcome
    ///
    /// The account address word for creation, the identifier for a new
    /// authorization, the call output otherwise.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            CommandOutcome::AccountCreated(address) => address.into_word().to_vec(),
            CommandOutcome::AuthorizationCreated {
                authorization_id, ..
            } => authorization_id.to_vec(),
            CommandOutcome::Executed { output, .. }
            | CommandOutcome::AuthorizedExecuted { output, .. } => output.clone(),
        }
    }
}

/// Command router
#[derive(Debug)]
pub struct EntryPoint {
    address: Address,
    owner: Address,
    channel: Box<dyn MessageChannel>,
    factory: AccountFactory,
    verifier: Box<dyn SignatureVerifier>,
    executors: HashSet<Address>,
}

impl EntryPoint {
    /// Create an entry point together with its account factory
    pub fn new(
        address: Address,
        owner: Address,
        factory_address: Address,
        channel: Box<dyn MessageChannel>,
    ) -> Self {
        Self {
            address,
            owner,
            channel,
            factory: AccountFactory::new(factory_address, address),
            verifier: Box::new(Secp256k1Verifier::new()),
            executors: HashSet::new(),
        }
    }

    /// Entry point address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Owner address
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Account factory
    pub fn factory(&self) -> &AccountFactory {
        &self.factory
    }

    /// Account factory, mutably (for reindexing after a restore)
    pub fn factory_mut(&mut self) -> &mut AccountFactory {
        &mut self.factory
    }

    /// Whether `address` may call [`EntryPoint::execute_payload`]
    pub fn is_executor(&self, address: &Address) -> bool {
        *address == self.owner || self.executors.contains(address)
    }

    /// Registered executors (owner excluded)
    pub fn executors(&self) -> impl Iterator<Item = &Address> {
        self.executors.iter()
    }

    /// Enable or disable an executor
    pub fn set_executor(
        &mut self,
        ledger: &mut Ledger,
        caller: Address,
        executor: Address,
        enabled: bool,
    ) -> Result<()> {
        if caller != self.owner {
            warn!(%caller, "Rejected executor change from non-owner");
            return Err(Error::NotOwner);
        }

        if enabled {
            self.executors.insert(executor);
        } else {
            self.executors.remove(&executor);
        }
        ledger.emit(Event::ExecutorUpdated { executor, enabled });
        info!(%executor, enabled, "Updated executor");
        Ok(())
    }

    /// Execute a command approved by the messaging channel
    pub fn execute(
        &mut self,
        ledger: &mut Ledger,
        command_id: B256,
        source_chain: &str,
        source_address: &str,
        payload: &[u8],
    ) -> Result<CommandOutcome> {
        let payload_hash = B256::from(keccak256_hash(payload));
        if !self
            .channel
            .is_contract_call_approved(&command_id, source_chain, source_address, &payload_hash)
        {
            warn!(%command_id, source_chain, source_address, "Message not approved by channel");
            return Err(Error::MessageNotApproved);
        }

        let (outcome, pending) = ledger.transact(|ledger| {
            let routed = self.route(ledger, source_chain, source_address, payload)?;
            if !self.channel.validate_contract_call(
                &command_id,
                source_chain,
                source_address,
                &payload_hash,
            ) {
                return Err(Error::MessageNotApproved);
            }
            debug!(%command_id, "Consumed channel approval");
            Ok(routed)
        })?;

        if let Some(pending) = pending {
            self.factory.register(pending);
        }
        Ok(outcome)
    }

    /// Execute a command on behalf of a trusted relay
    ///
    /// The caller must be the owner or a registered executor. This is checked
    /// before the payload is looked at.
    pub fn execute_payload(
        &mut self,
        ledger: &mut Ledger,
        caller: Address,
        source_chain: &str,
        source_address: &str,
        payload: &[u8],
    ) -> Result<CommandOutcome> {
        if !self.is_executor(&caller) {
            warn!(%caller, "Rejected payload from non-executor");
            return Err(Error::NotExecutor(caller));
        }
        let (outcome, pending) =
            ledger.transact(|ledger| self.route(ledger, source_chain, source_address, payload))?;

        if let Some(pending) = pending {
            self.factory.register(pending);
        }
        Ok(outcome)
    }

    /// Perform a call from an account without signatures (owner only)
    pub fn execute_direct(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        account: Address,
        call: &Call,
    ) -> Result<Vec<u8>> {
        if caller != self.owner {
            return Err(Error::NotOwner);
        }
        Account::execute_direct(ledger, self.address, account, call)
    }

    /// Decode and run a command
    ///
    /// Registry updates are returned rather than applied so they only take
    /// effect once the caller's transaction commits.
    fn route(
        &self,
        ledger: &mut Ledger,
        source_chain: &str,
        source_address: &str,
        payload: &[u8],
    ) -> Result<(CommandOutcome, Option<PendingRegistration>)> {
        let command = Command::decode(payload).inspect_err(|e| {
            warn!(source_chain, source_address, error = %e, "Rejected command payload");
        })?;
        debug!(tag = command.tag(), source_chain, source_address, "Routing command");

        match command {
            Command::CreateAccount {
                recovery,
                signers,
                threshold,
                bootstrap,
            } => {
                let key = AccountKey::new(signers, origin_binding(source_address), threshold);
                let (address, pending) =
                    self.factory
                        .deploy(ledger, recovery, key, bootstrap.as_ref())?;
                Ok((CommandOutcome::AccountCreated(address), pending))
            }
            Command::Execute {
                account,
                operation,
                payload,
            } => {
                let output = Account::execute_validated(
                    ledger,
                    self.verifier.as_ref(),
                    self.address,
                    account,
                    source_address,
                    &operation,
                    &payload,
                )?;
                Ok((CommandOutcome::Executed { account, output }, None))
            }
            Command::CreateAuthorization {
                account,
                operation,
                expiry,
                predicates,
                payload,
            } => {
                let expiry = i64::try_from(expiry).map_err(|_| {
                    Error::MalformedPayload(format!("expiry {} out of range", expiry))
                })?;
                let authorization_id = Account::create_authorization(
                    ledger,
                    self.verifier.as_ref(),
                    self.address,
                    account,
                    source_address,
                    &operation,
                    expiry,
                    predicates,
                    &payload,
                )?;
                let outcome = CommandOutcome::AuthorizationCreated {
                    account,
                    authorization_id,
                };
                Ok((outcome, None))
            }
            Command::ExecuteAuthorized {
                account,
                authorization_id,
                payload,
            } => {
                let output = Account::execute_authorized(
                    ledger,
                    self.address,
                    account,
                    source_address,
                    authorization_id,
                    &payload,
                )?;
                Ok((CommandOutcome::AuthorizedExecuted { account, output }, None))
            }
        }
    }
}

impl MessageReceiver for EntryPoint {
    fn address(&self) -> Address {
        self.address
    }

    fn receive_message(
        &mut self,
        ledger: &mut Ledger,
        caller: Address,
        source_chain: &str,
        source_address: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        self.execute_payload(ledger, caller, source_chain, source_address, payload)
            .map(|outcome| outcome.encode())
    }
}
