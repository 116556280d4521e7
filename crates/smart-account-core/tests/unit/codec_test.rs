//! Unit tests for the entry point command codec

use crate::common::{RECIPIENT, RECOVERY, sign_operation, signer};
use alloy_primitives::{Address, B256, U256};
use smart_account_core::entry_point::codec::{
    CREATE_HEADER_LEN, EXECUTE_HEADER_LEN, SIGNATURE_LEN, SIGNER_KEY_LEN,
};
use smart_account_core::factory::BootstrapProof;
use smart_account_core::{Call, Command, Error, Predicate};

fn word(value: u64) -> [u8; 32] {
    U256::from(value).to_be_bytes::<32>()
}

#[test]
fn test_create_account_layout() {
    let a = signer(1).public_key();
    let b = signer(2).public_key();
    let command = Command::CreateAccount {
        recovery: RECOVERY,
        signers: vec![a, b],
        threshold: 2,
        bootstrap: None,
    };

    let encoded = command.encode();
    assert_eq!(encoded.len(), CREATE_HEADER_LEN + 2 * SIGNER_KEY_LEN);
    assert_eq!(encoded[..32], word(1));
    assert_eq!(&encoded[44..64], RECOVERY.as_slice());
    assert_eq!(encoded[64..96], word(2));
    assert_eq!(encoded[96..128], word(2));
    assert_eq!(&encoded[128..160], a.x.as_slice());
    assert_eq!(&encoded[224..256], b.y.as_slice());

    assert_eq!(Command::decode(&encoded).unwrap(), command);
}

#[test]
fn test_create_account_with_bootstrap_proof() {
    let command = Command::CreateAccount {
        recovery: RECOVERY,
        signers: vec![signer(1).public_key()],
        threshold: 1,
        bootstrap: Some(BootstrapProof {
            message_hash: B256::repeat_byte(1),
            r: B256::repeat_byte(2),
            s: B256::repeat_byte(3),
        }),
    };
    let encoded = command.encode();
    assert_eq!(Command::decode(&encoded).unwrap(), command);

    // A partial proof is neither absent nor complete
    let truncated = &encoded[..encoded.len() - 1];
    assert!(matches!(Command::decode(truncated), Err(Error::MalformedPayload(_))));
}

#[test]
fn test_execute_layout_and_payload_passthrough() {
    let call = Call::transfer(RECIPIENT, U256::from(7u64));
    let payload = call.encode();
    let op = sign_operation(&[&signer(1), &signer(2)], 3, &payload);
    let command = Command::Execute {
        account: Address::repeat_byte(0xac),
        operation: op.clone(),
        payload: payload.clone().into(),
    };

    let encoded = command.encode();
    assert_eq!(encoded.len(), EXECUTE_HEADER_LEN + 2 * SIGNATURE_LEN + payload.len());
    assert_eq!(&encoded[64..96], op.message_hash.as_slice());
    assert_eq!(&encoded[96..128], op.proof.as_slice());
    assert_eq!(encoded[128..160], word(3));
    assert_eq!(encoded[160..192], word(2));
    assert_eq!(&encoded[EXECUTE_HEADER_LEN + 2 * SIGNATURE_LEN..], payload.as_slice());

    match Command::decode(&encoded).unwrap() {
        Command::Execute { operation, payload: decoded, .. } => {
            assert_eq!(operation, op);
            assert_eq!(Call::decode(&decoded).unwrap(), call);
        }
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_create_authorization_decodes_predicates() {
    let predicates = vec![
        Predicate::equal(12, 20, RECIPIENT.into_word()).unwrap(),
        Predicate::less_or_equal(32, 32, U256::from(10u64)).unwrap(),
        Predicate::daily_sum_less_or_equal(32, 32, U256::from(25u64)).unwrap(),
    ];
    let command = Command::CreateAuthorization {
        account: Address::repeat_byte(0xac),
        operation: sign_operation(&[&signer(1)], 0, b""),
        expiry: 1_800_000_000,
        predicates: predicates.clone(),
        payload: Default::default(),
    };

    match Command::decode(&command.encode()).unwrap() {
        Command::CreateAuthorization { predicates: decoded, expiry, .. } => {
            assert_eq!(decoded, predicates);
            assert_eq!(expiry, 1_800_000_000);
        }
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_unknown_and_malformed_tags() {
    let mut payload = word(9).to_vec();
    payload.extend_from_slice(&[0u8; 256]);
    assert!(matches!(Command::decode(&payload), Err(Error::UnknownCommand(9))));

    payload[0] = 1;
    assert!(matches!(Command::decode(&payload), Err(Error::MalformedPayload(_))));

    assert!(matches!(Command::decode(&[]), Err(Error::MalformedPayload(_))));
    assert!(matches!(Command::decode(&[0u8; 31]), Err(Error::MalformedPayload(_))));
}

#[test]
fn test_counts_must_fit_payload() {
    // Execute header claiming three signatures with none present
    let mut payload = word(2).to_vec();
    payload.extend_from_slice(Address::repeat_byte(0xac).into_word().as_slice());
    payload.extend_from_slice(&[0u8; 64]);
    payload.extend_from_slice(&word(0));
    payload.extend_from_slice(&word(3));
    assert_eq!(payload.len(), EXECUTE_HEADER_LEN);
    assert!(matches!(Command::decode(&payload), Err(Error::MalformedPayload(_))));

    // Create-account with an absurd signer count
    let mut payload = word(1).to_vec();
    payload.extend_from_slice(RECOVERY.into_word().as_slice());
    payload.extend_from_slice(&U256::from(u64::MAX).to_be_bytes::<32>());
    payload.extend_from_slice(&word(1));
    assert!(matches!(Command::decode(&payload), Err(Error::MalformedPayload(_))));
}

#[test]
fn test_dirty_address_padding_rejected() {
    let command = Command::ExecuteAuthorized {
        account: Address::repeat_byte(0xac),
        authorization_id: B256::repeat_byte(0x11),
        payload: Default::default(),
    };
    let mut encoded = command.encode();
    assert_eq!(Command::decode(&encoded).unwrap(), command);

    encoded[32] = 0x01;
    assert!(matches!(Command::decode(&encoded), Err(Error::MalformedPayload(_))));
}

#[test]
fn test_unknown_comparison_code_rejected() {
    let command = Command::CreateAuthorization {
        account: Address::repeat_byte(0xac),
        operation: sign_operation(&[&signer(1)], 0, b""),
        expiry: 0,
        predicates: vec![Predicate::less_or_equal(0, 32, U256::from(1u64)).unwrap()],
        payload: Default::default(),
    };
    let mut encoded = command.encode();
    // comparison word of the only predicate follows the signature table
    let comparison_end = 8 * 32 + SIGNATURE_LEN + 3 * 32;
    encoded[comparison_end - 1] = 3;
    assert!(matches!(Command::decode(&encoded), Err(Error::InvalidPredicate(_))));
}
