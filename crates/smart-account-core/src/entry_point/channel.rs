//! Cross-chain messaging channel interface
//!
//! The channel authenticates `(commandId, sourceChain, sourceAddress,
//! payloadHash)` tuples delivered from other chains. [`InMemoryChannel`] is
//! a local stand-in used by tests and single-process deployments.

use crate::types::keccak256_hash;
use alloy_primitives::B256;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Authenticates messages delivered by the cross-chain channel
pub trait MessageChannel: Send + Sync + fmt::Debug {
    /// Whether the tuple is approved, without consuming the approval
    fn is_contract_call_approved(
        &self,
        command_id: &B256,
        source_chain: &str,
        source_address: &str,
        payload_hash: &B256,
    ) -> bool;

    /// Consume the approval for the tuple
    ///
    /// Returns `false` if it was never approved or was already consumed.
    fn validate_contract_call(
        &self,
        command_id: &B256,
        source_chain: &str,
        source_address: &str,
        payload_hash: &B256,
    ) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Approval {
    command_id: B256,
    source_chain: String,
    source_address: String,
    payload_hash: B256,
}

impl Approval {
    fn new(command_id: &B256, source_chain: &str, source_address: &str, payload_hash: &B256) -> Self {
        Self {
            command_id: *command_id,
            source_chain: source_chain.to_string(),
            source_address: source_address.to_string(),
            payload_hash: *payload_hash,
        }
    }
}

#[derive(Debug, Default)]
struct ChannelState {
    approved: HashSet<Approval>,
    consumed: HashSet<B256>,
}

/// In-memory channel
///
/// Clones share the same approval table, so a test can keep one handle to
/// approve messages while the entry point owns another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl InMemoryChannel {
    /// Create an empty channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Approve a message by payload hash
    ///
    /// Returns `false` if the command id was already consumed.
    pub fn approve(
        &self,
        command_id: B256,
        source_chain: &str,
        source_address: &str,
        payload_hash: B256,
    ) -> bool {
        let mut state = self.state.lock();
        if state.consumed.contains(&command_id) {
            return false;
        }
        state
            .approved
            .insert(Approval::new(&command_id, source_chain, source_address, &payload_hash));
        debug!(%command_id, source_chain, source_address, "Approved contract call");
        true
    }

    /// Approve a message, hashing the payload
    pub fn approve_payload(
        &self,
        command_id: B256,
        source_chain: &str,
        source_address: &str,
        payload: &[u8],
    ) -> bool {
        self.approve(
            command_id,
            source_chain,
            source_address,
            B256::from(keccak256_hash(payload)),
        )
    }

    /// Whether an approval for `command_id` was consumed
    pub fn is_consumed(&self, command_id: &B256) -> bool {
        self.state.lock().consumed.contains(command_id)
    }

    /// Number of approvals not yet consumed
    pub fn pending_count(&self) -> usize {
        self.state.lock().approved.len()
    }
}

impl MessageChannel for InMemoryChannel {
    fn is_contract_call_approved(
        &self,
        command_id: &B256,
        source_chain: &str,
        source_address: &str,
        payload_hash: &B256,
    ) -> bool {
        let approval = Approval::new(command_id, source_chain, source_address, payload_hash);
        self.state.lock().approved.contains(&approval)
    }

    fn validate_contract_call(
        &self,
        command_id: &B256,
        source_chain: &str,
        source_address: &str,
        payload_hash: &B256,
    ) -> bool {
        let approval = Approval::new(command_id, source_chain, source_address, payload_hash);
        let mut state = self.state.lock();
        if !state.approved.remove(&approval) {
            return false;
        }
        state.consumed.insert(*command_id);
        true
    }
}
