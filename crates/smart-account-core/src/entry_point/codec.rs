//! Command payload encoding
//!
//! Every fixed field is a 32-byte big-endian word. Addresses are right
//! aligned, integers must fit their Rust type (the remaining high bytes are
//! zero). Commands 2, 3 and 4 end with a raw transaction payload whose length
//! is whatever follows the fixed fields.
//!
//! | tag | layout |
//! |-----|--------|
//! | 1 | `tag, recovery, totalSigners, threshold, (X, Y) x N [, messageHash, r, s]` |
//! | 2 | `tag, account, messageHash, proof, sequence, count, (r, s, X, Y) x count, txPayload` |
//! | 3 | `tag, account, messageHash, proof, sequence, expiry, count, ruleCount, (r, s, X, Y) x count, (offset, length, kind, bound) x ruleCount, txPayload` |
//! | 4 | `tag, account, authorizationId, txPayload` |

use crate::account::{Comparison, Predicate, SignedOperation};
use crate::factory::BootstrapProof;
use crate::types::{PublicKey, SignerSignature, WORD_LEN, word_to_address};
use crate::{Error, Result};
use alloy_primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Serialize};

/// Tag of the create-account command
pub const TAG_CREATE_ACCOUNT: u8 = 1;
/// Tag of the validated execution command
pub const TAG_EXECUTE: u8 = 2;
/// Tag of the create-authorization command
pub const TAG_CREATE_AUTHORIZATION: u8 = 3;
/// Tag of the authorized execution command
pub const TAG_EXECUTE_AUTHORIZED: u8 = 4;

/// Fixed part of a create-account command
pub const CREATE_HEADER_LEN: usize = 4 * WORD_LEN;
/// One signer key `(X, Y)`
pub const SIGNER_KEY_LEN: usize = 2 * WORD_LEN;
/// Optional trailing bootstrap proof `(messageHash, r, s)`
pub const BOOTSTRAP_LEN: usize = 3 * WORD_LEN;
/// Fixed part of an execute command
pub const EXECUTE_HEADER_LEN: usize = 6 * WORD_LEN;
/// One signature tuple `(r, s, X, Y)`
pub const SIGNATURE_LEN: usize = 4 * WORD_LEN;
/// Fixed part of a create-authorization command
pub const CREATE_AUTHORIZATION_HEADER_LEN: usize = 8 * WORD_LEN;
/// One predicate `(offset, length, kind, bound)`
pub const PREDICATE_LEN: usize = 4 * WORD_LEN;
/// Fixed part of an authorized execution command
pub const EXECUTE_AUTHORIZED_HEADER_LEN: usize = 3 * WORD_LEN;

/// Decoded entry point command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Deploy (or look up) an account
    CreateAccount {
        recovery: Address,
        signers: Vec<PublicKey>,
        threshold: u64,
        bootstrap: Option<BootstrapProof>,
    },
    /// Threshold-signed call
    Execute {
        account: Address,
        operation: SignedOperation,
        payload: Bytes,
    },
    /// Threshold-signed authorization grant
    CreateAuthorization {
        account: Address,
        operation: SignedOperation,
        /// Unix seconds, inclusive
        expiry: u64,
        predicates: Vec<Predicate>,
        payload: Bytes,
    },
    /// Call under an existing authorization
    ExecuteAuthorized {
        account: Address,
        authorization_id: B256,
        payload: Bytes,
    },
}

impl Command {
    /// Wire tag
    pub fn tag(&self) -> u8 {
        match self {
            Command::CreateAccount { .. } => TAG_CREATE_ACCOUNT,
            Command::Execute { .. } => TAG_EXECUTE,
            Command::CreateAuthorization { .. } => TAG_CREATE_AUTHORIZATION,
            Command::ExecuteAuthorized { .. } => TAG_EXECUTE_AUTHORIZED,
        }
    }

    /// Decode a command payload
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data);
        let tag_word = reader.word("tag")?;
        if tag_word[..WORD_LEN - 1].iter().any(|b| *b != 0) {
            return Err(Error::MalformedPayload(format!(
                "tag word 0x{} out of range",
                hex::encode(tag_word)
            )));
        }

        match tag_word[WORD_LEN - 1] {
            TAG_CREATE_ACCOUNT => decode_create_account(reader),
            TAG_EXECUTE => decode_execute(reader),
            TAG_CREATE_AUTHORIZATION => decode_create_authorization(reader),
            TAG_EXECUTE_AUTHORIZED => decode_execute_authorized(reader),
            other => Err(Error::UnknownCommand(other)),
        }
    }

    /// Encode the command payload
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_u64(&mut out, self.tag() as u64);

        match self {
            Command::CreateAccount {
                recovery,
                signers,
                threshold,
                bootstrap,
            } => {
                out.extend_from_slice(recovery.into_word().as_slice());
                put_u64(&mut out, signers.len() as u64);
                put_u64(&mut out, *threshold);
                for signer in signers {
                    out.extend_from_slice(signer.x.as_slice());
                    out.extend_from_slice(signer.y.as_slice());
                }
                if let Some(proof) = bootstrap {
                    out.extend_from_slice(proof.message_hash.as_slice());
                    out.extend_from_slice(proof.r.as_slice());
                    out.extend_from_slice(proof.s.as_slice());
                }
            }
            Command::Execute {
                account,
                operation,
                payload,
            } => {
                out.extend_from_slice(account.into_word().as_slice());
                out.extend_from_slice(operation.message_hash.as_slice());
                out.extend_from_slice(operation.proof.as_slice());
                put_u64(&mut out, operation.sequence);
                put_u64(&mut out, operation.signatures.len() as u64);
                put_signatures(&mut out, &operation.signatures);
                out.extend_from_slice(payload);
            }
            Command::CreateAuthorization {
                account,
                operation,
                expiry,
                predicates,
                payload,
            } => {
                out.extend_from_slice(account.into_word().as_slice());
                out.extend_from_slice(operation.message_hash.as_slice());
                out.extend_from_slice(operation.proof.as_slice());
                put_u64(&mut out, operation.sequence);
                put_u64(&mut out, *expiry);
                put_u64(&mut out, operation.signatures.len() as u64);
                put_u64(&mut out, predicates.len() as u64);
                put_signatures(&mut out, &operation.signatures);
                for predicate in predicates {
                    put_u64(&mut out, predicate.field_offset as u64);
                    put_u64(&mut out, predicate.field_length as u64);
                    put_u64(&mut out, predicate.comparison.code());
                    out.extend_from_slice(predicate.bound.as_slice());
                }
                out.extend_from_slice(payload);
            }
            Command::ExecuteAuthorized {
                account,
                authorization_id,
                payload,
            } => {
                out.extend_from_slice(account.into_word().as_slice());
                out.extend_from_slice(authorization_id.as_slice());
                out.extend_from_slice(payload);
            }
        }

        out
    }
}

fn decode_create_account(mut reader: Reader<'_>) -> Result<Command> {
    reader.ensure_header(CREATE_HEADER_LEN, "create-account header")?;
    let recovery = reader.address("recovery")?;
    let total = reader.u64("total signers")?;
    let threshold = reader.u64("threshold")?;

    let keys_len = table_len(total, SIGNER_KEY_LEN, "signer keys")?;
    reader.require(keys_len, "signer keys")?;
    let mut signers = Vec::new();
    for _ in 0..total {
        let x = reader.word("signer x")?;
        let y = reader.word("signer y")?;
        signers.push(PublicKey::new(x, y));
    }

    let bootstrap = match reader.remaining() {
        0 => None,
        BOOTSTRAP_LEN => Some(BootstrapProof {
            message_hash: reader.word("bootstrap hash")?,
            r: reader.word("bootstrap r")?,
            s: reader.word("bootstrap s")?,
        }),
        other => {
            return Err(Error::MalformedPayload(format!(
                "create-account has {} trailing bytes, expected 0 or {}",
                other, BOOTSTRAP_LEN
            )));
        }
    };

    Ok(Command::CreateAccount {
        recovery,
        signers,
        threshold,
        bootstrap,
    })
}

fn decode_execute(mut reader: Reader<'_>) -> Result<Command> {
    reader.ensure_header(EXECUTE_HEADER_LEN, "execute header")?;
    let account = reader.address("account")?;
    let message_hash = reader.word("message hash")?;
    let proof = reader.word("proof")?;
    let sequence = reader.u64("sequence")?;
    let count = reader.u64("signature count")?;
    let signatures = read_signatures(&mut reader, count)?;

    Ok(Command::Execute {
        account,
        operation: SignedOperation {
            message_hash,
            proof,
            sequence,
            signatures,
        },
        payload: reader.rest(),
    })
}

fn decode_create_authorization(mut reader: Reader<'_>) -> Result<Command> {
    reader.ensure_header(CREATE_AUTHORIZATION_HEADER_LEN, "create-authorization header")?;
    let account = reader.address("account")?;
    let message_hash = reader.word("message hash")?;
    let proof = reader.word("proof")?;
    let sequence = reader.u64("sequence")?;
    let expiry = reader.u64("expiry")?;
    let count = reader.u64("signature count")?;
    let rule_count = reader.u64("rule count")?;
    let signatures = read_signatures(&mut reader, count)?;

    let rules_len = table_len(rule_count, PREDICATE_LEN, "predicates")?;
    reader.require(rules_len, "predicates")?;
    let mut predicates = Vec::new();
    for _ in 0..rule_count {
        let field_offset = reader.u32("field offset")?;
        let field_length = reader.u32("field length")?;
        let comparison = Comparison::from_code(reader.u64("comparison")?)?;
        let bound = reader.word("bound")?;
        predicates.push(Predicate::new(field_offset, field_length, comparison, bound)?);
    }

    Ok(Command::CreateAuthorization {
        account,
        operation: SignedOperation {
            message_hash,
            proof,
            sequence,
            signatures,
        },
        expiry,
        predicates,
        payload: reader.rest(),
    })
}

fn decode_execute_authorized(mut reader: Reader<'_>) -> Result<Command> {
    reader.ensure_header(EXECUTE_AUTHORIZED_HEADER_LEN, "execute-authorized header")?;
    let account = reader.address("account")?;
    let authorization_id = reader.word("authorization id")?;

    Ok(Command::ExecuteAuthorized {
        account,
        authorization_id,
        payload: reader.rest(),
    })
}

fn read_signatures(reader: &mut Reader<'_>, count: u64) -> Result<Vec<SignerSignature>> {
    let len = table_len(count, SIGNATURE_LEN, "signatures")?;
    reader.require(len, "signatures")?;

    let mut signatures = Vec::new();
    for _ in 0..count {
        let r = reader.word("signature r")?;
        let s = reader.word("signature s")?;
        let x = reader.word("signer x")?;
        let y = reader.word("signer y")?;
        signatures.push(SignerSignature::new(r, s, PublicKey::new(x, y)));
    }
    Ok(signatures)
}

fn table_len(count: u64, entry_len: usize, what: &str) -> Result<usize> {
    usize::try_from(count)
        .ok()
        .and_then(|c| c.checked_mul(entry_len))
        .ok_or_else(|| Error::MalformedPayload(format!("{} count {} too large", what, count)))
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&U256::from(value).to_be_bytes::<32>());
}

fn put_signatures(out: &mut Vec<u8>, signatures: &[SignerSignature]) {
    for sig in signatures {
        out.extend_from_slice(sig.r.as_slice());
        out.extend_from_slice(sig.s.as_slice());
        out.extend_from_slice(sig.public_key.x.as_slice());
        out.extend_from_slice(sig.public_key.y.as_slice());
    }
}

/// Cursor over a command payload
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Fail unless the whole payload is at least `len` bytes long
    fn ensure_header(&self, len: usize, what: &str) -> Result<()> {
        if self.data.len() < len {
            return Err(Error::MalformedPayload(format!(
                "{} needs {} bytes, payload has {}",
                what,
                len,
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Fail unless `len` more bytes are available
    fn require(&self, len: usize, what: &str) -> Result<()> {
        if self.remaining() < len {
            return Err(Error::MalformedPayload(format!(
                "{} needs {} bytes, {} left",
                what,
                len,
                self.remaining()
            )));
        }
        Ok(())
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        self.require(len, what)?;
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn word(&mut self, what: &str) -> Result<B256> {
        Ok(B256::from_slice(self.take(WORD_LEN, what)?))
    }

    fn address(&mut self, what: &str) -> Result<Address> {
        let word = self.take(WORD_LEN, what)?;
        word_to_address(word)
    }

    fn u64(&mut self, what: &str) -> Result<u64> {
        let word = self.take(WORD_LEN, what)?;
        if word[..WORD_LEN - 8].iter().any(|b| *b != 0) {
            return Err(Error::MalformedPayload(format!("{} does not fit in 64 bits", what)));
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&word[WORD_LEN - 8..]);
        Ok(u64::from_be_bytes(bytes))
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let value = self.u64(what)?;
        u32::try_from(value)
            .map_err(|_| Error::MalformedPayload(format!("{} does not fit in 32 bits", what)))
    }

    fn rest(&mut self) -> Bytes {
        let rest = Bytes::copy_from_slice(&self.data[self.pos..]);
        self.pos = self.data.len();
        rest
    }
}
