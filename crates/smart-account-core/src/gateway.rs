//! MPC gateway: signature-gated forwarding of cross-chain contract calls
//!
//! A relay submits a contract call together with a signature from the MPC
//! key over its transaction hash. The gateway refuses hashes it has already
//! executed, checks the signature with its [`SignatureAuthority`], then
//! delivers the payload to the destination. The hash is recorded only when
//! delivery succeeds, so a failed call can be retried.

use crate::crypto::SignatureAuthority;
use crate::entry_point::MessageReceiver;
use crate::ledger::{Event, Ledger};
use crate::types::{WORD_LEN, sha256_hash};
use crate::{Error, Result};
use alloy_primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Signed request to forward a contract call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCallRequest {
    /// Signature R over the transaction hash
    pub r: B256,
    /// Signature S over the transaction hash
    pub s: B256,
    /// Chain the call originates from
    pub source_chain: String,
    /// Sender on the source chain
    pub source_address: String,
    /// Chain the call is delivered to
    pub destination_chain: String,
    /// Receiving contract
    pub destination_address: Address,
    /// Payload handed to the receiver
    pub payload: Bytes,
}

impl ContractCallRequest {
    /// Transaction hash the signature must cover
    pub fn tx_hash(&self) -> B256 {
        generate_tx_hash(
            &self.source_chain,
            &self.source_address,
            &self.destination_chain,
            self.destination_address,
            &self.payload,
        )
    }
}

/// `sha256(abi.encode(sourceChain, sourceAddress, destinationChain, destinationAddress, payload))`
pub fn generate_tx_hash(
    source_chain: &str,
    source_address: &str,
    destination_chain: &str,
    destination_address: Address,
    payload: &[u8],
) -> B256 {
    let encoded = abi_encode_call(
        source_chain,
        source_address,
        destination_chain,
        destination_address,
        payload,
    );
    B256::from(sha256_hash(&encoded))
}

/// ABI encoding of `(string, string, string, address, bytes)`
fn abi_encode_call(
    source_chain: &str,
    source_address: &str,
    destination_chain: &str,
    destination_address: Address,
    payload: &[u8],
) -> Vec<u8> {
    const HEAD_LEN: usize = 5 * WORD_LEN;

    let dynamic: [&[u8]; 4] = [
        source_chain.as_bytes(),
        source_address.as_bytes(),
        destination_chain.as_bytes(),
        payload,
    ];

    let mut offsets = [0usize; 4];
    let mut next = HEAD_LEN;
    for (offset, data) in offsets.iter_mut().zip(dynamic.iter()) {
        *offset = next;
        next += WORD_LEN + padded_len(data.len());
    }

    let mut out = Vec::with_capacity(next);
    put_word(&mut out, offsets[0]);
    put_word(&mut out, offsets[1]);
    put_word(&mut out, offsets[2]);
    out.extend_from_slice(destination_address.into_word().as_slice());
    put_word(&mut out, offsets[3]);

    for data in dynamic {
        put_word(&mut out, data.len());
        out.extend_from_slice(data);
        out.resize(out.len() + padded_len(data.len()) - data.len(), 0);
    }
    out
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD_LEN) * WORD_LEN
}

fn put_word(out: &mut Vec<u8>, value: usize) {
    out.extend_from_slice(&U256::from(value).to_be_bytes::<32>());
}

/// Gateway state
pub struct MpcGateway {
    address: Address,
    authority: Arc<dyn SignatureAuthority>,
    executed: HashSet<B256>,
}

impl MpcGateway {
    /// Create a gateway trusting `authority` for signatures
    pub fn new(address: Address, authority: Arc<dyn SignatureAuthority>) -> Self {
        Self {
            address,
            authority,
            executed: HashSet::new(),
        }
    }

    /// Gateway address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Whether a transaction hash was executed
    pub fn is_executed(&self, tx_hash: &B256) -> bool {
        self.executed.contains(tx_hash)
    }

    /// Executed hashes, sorted
    pub fn executed_hashes(&self) -> Vec<B256> {
        let mut hashes: Vec<B256> = self.executed.iter().copied().collect();
        hashes.sort();
        hashes
    }

    /// Mark hashes as executed (used when restoring persisted state)
    pub fn restore_executed(&mut self, hashes: impl IntoIterator<Item = B256>) {
        self.executed.extend(hashes);
    }

    /// Verify and deliver a contract call
    pub fn execute_contract_call(
        &mut self,
        ledger: &mut Ledger,
        request: &ContractCallRequest,
        destination: &mut dyn MessageReceiver,
    ) -> Result<Vec<u8>> {
        let tx_hash = request.tx_hash();
        if self.executed.contains(&tx_hash) {
            warn!(%tx_hash, "Transaction already executed");
            return Err(Error::TransactionAlreadyExecuted(tx_hash));
        }

        if !self
            .authority
            .validate_signature(&tx_hash, &request.r, &request.s)
        {
            warn!(%tx_hash, "Transaction signature not approved");
            return Err(Error::TransactionNotApproved(tx_hash));
        }

        if destination.address() != request.destination_address {
            return Err(Error::InvalidConfig(format!(
                "destination {} does not match request {}",
                destination.address(),
                request.destination_address
            )));
        }

        let gateway = self.address;
        let output = ledger.transact(|ledger| {
            ledger.emit(Event::ContractCallApproved {
                source_chain: request.source_chain.clone(),
                source_address: request.source_address.clone(),
                destination: request.destination_address,
                tx_hash,
            });

            let output = destination
                .receive_message(
                    ledger,
                    gateway,
                    &request.source_chain,
                    &request.source_address,
                    &request.payload,
                )
                .map_err(|e| Error::TransactionFailed {
                    tx_hash,
                    reason: e.to_string(),
                })?;

            ledger.emit(Event::ContractCallExecuted {
                source_chain: request.source_chain.clone(),
                source_address: request.source_address.clone(),
                destination: request.destination_address,
                tx_hash,
            });
            Ok(output)
        })?;

        self.executed.insert(tx_hash);
        info!(
            %tx_hash,
            source_chain = %request.source_chain,
            destination = %request.destination_address,
            "Executed contract call"
        );
        Ok(output)
    }
}

impl fmt::Debug for MpcGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpcGateway")
            .field("address", &self.address)
            .field("authority", &self.authority)
            .field("executed", &self.executed.len())
            .finish()
    }
}
