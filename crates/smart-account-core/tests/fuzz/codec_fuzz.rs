//! Fuzz tests for the command decoder
//!
//! Arbitrary payloads must produce a command or an error, never a panic.

use alloy_primitives::{Address, B256, Bytes, U256};
use proptest::prelude::*;
use smart_account_core::{Command, ErrorKind, PublicKey, SignedOperation, SignerSignature};

// ============================================================================
// Strategies for generating test data
// ============================================================================

fn word_strategy() -> impl Strategy<Value = B256> {
    any::<[u8; 32]>().prop_map(B256::from)
}

/// Tag word for a known command followed by arbitrary bytes
fn tagged_payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    (1u64..=4, prop::collection::vec(any::<u8>(), 0..600)).prop_map(|(tag, rest)| {
        let mut payload = U256::from(tag).to_be_bytes::<32>().to_vec();
        payload.extend(rest);
        payload
    })
}

/// Plausible header with small counts and a random tail
fn structured_payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    (
        1u64..=4,
        prop::collection::vec(0u64..4, 4..8),
        prop::collection::vec(any::<u8>(), 0..400),
    )
        .prop_map(|(tag, counts, tail)| {
            let mut payload = U256::from(tag).to_be_bytes::<32>().to_vec();
            payload.extend_from_slice(Address::repeat_byte(0xac).into_word().as_slice());
            for count in counts {
                payload.extend_from_slice(&U256::from(count).to_be_bytes::<32>());
            }
            payload.extend(tail);
            payload
        })
}

fn execute_strategy() -> impl Strategy<Value = Command> {
    (
        any::<[u8; 20]>(),
        word_strategy(),
        word_strategy(),
        any::<u64>(),
        prop::collection::vec((word_strategy(), word_strategy(), word_strategy(), word_strategy()), 0..4),
        prop::collection::vec(any::<u8>(), 0..200),
    )
        .prop_map(|(account, message_hash, proof, sequence, sigs, payload)| Command::Execute {
            account: Address::from(account),
            operation: SignedOperation {
                message_hash,
                proof,
                sequence,
                signatures: sigs
                    .into_iter()
                    .map(|(r, s, x, y)| SignerSignature::new(r, s, PublicKey::new(x, y)))
                    .collect(),
            },
            payload: Bytes::from(payload),
        })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn fuzz_decode_arbitrary_bytes(data in prop::collection::vec(any::<u8>(), 0..1024)) {
        let _ = Command::decode(&data);
    }

    #[test]
    fn fuzz_decode_tagged_payload(data in tagged_payload_strategy()) {
        if let Err(e) = Command::decode(&data) {
            prop_assert_eq!(e.kind(), ErrorKind::Structural);
        }
    }

    #[test]
    fn fuzz_decode_structured_payload(data in structured_payload_strategy()) {
        if let Ok(command) = Command::decode(&data) {
            prop_assert_eq!(command.encode().len(), data.len());
        }
    }

    #[test]
    fn fuzz_execute_survives_encoding(command in execute_strategy()) {
        prop_assert_eq!(Command::decode(&command.encode()).unwrap(), command);
    }
}
