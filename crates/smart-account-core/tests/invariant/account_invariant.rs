//! Invariant tests for smart accounts
//!
//! These tests verify critical invariants that must always hold:
//! - A signed operation executes at most once
//! - Sequences only move forward, one step per successful operation
//! - Fewer than `threshold` distinct valid signatures never execute
//! - Failed commands leave no trace in ledger state

use crate::common::{Harness, RECIPIENT, SOURCE, execute_command, sign_operation, signer};
use alloy_primitives::{B256, U256};
use proptest::prelude::*;
use smart_account_core::{Call, Command, Error, LocalSigner};

/// Account with `n` signers and the given threshold, funded with 1000
fn setup(n: u8, threshold: u64) -> (Harness, Vec<LocalSigner>, alloy_primitives::Address) {
    let mut h = Harness::new();
    let signers: Vec<LocalSigner> = (1..=n).map(signer).collect();
    let refs: Vec<&LocalSigner> = signers.iter().collect();
    let account = h.create_account(SOURCE, &refs, threshold);
    h.ledger.fund(account, U256::from(1_000u64));
    (h, signers, account)
}

#[test]
fn invariant_signed_operation_executes_once() {
    let (mut h, signers, account) = setup(1, 1);
    let command = execute_command(account, &[&signers[0]], 0, &Call::transfer(RECIPIENT, U256::from(1u64)));

    h.deliver(SOURCE, &command).unwrap();
    for _ in 0..3 {
        let err = h.deliver(SOURCE, &command).unwrap_err();
        assert!(err.is_replay());
    }
    assert_eq!(h.ledger.balance_of(&RECIPIENT), U256::from(1u64));
    assert_eq!(h.sequence(&account), 1);
}

#[test]
fn invariant_sequence_must_match_exactly() {
    let (mut h, signers, account) = setup(1, 1);
    let call = Call::transfer(RECIPIENT, U256::from(1u64));

    for sequence in [1u64, 5, u64::MAX] {
        let err = h
            .deliver(SOURCE, &execute_command(account, &[&signers[0]], sequence, &call))
            .unwrap_err();
        assert!(matches!(err, Error::SequenceMismatch { expected: 0, actual } if actual == sequence));
    }
    assert_eq!(h.sequence(&account), 0);
}

#[test]
fn invariant_duplicate_signatures_do_not_count() {
    let (mut h, signers, account) = setup(3, 2);
    let call = Call::transfer(RECIPIENT, U256::from(1u64));

    let err = h
        .deliver(SOURCE, &execute_command(account, &[&signers[0], &signers[0]], 0, &call))
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateSigner(1)));

    let outsider = signer(0x44);
    let err = h
        .deliver(SOURCE, &execute_command(account, &[&signers[0], &outsider], 0, &call))
        .unwrap_err();
    assert!(matches!(err, Error::UnknownSigner(_)));

    h.deliver(SOURCE, &execute_command(account, &[&signers[2], &signers[1]], 0, &call))
        .unwrap();
}

#[test]
fn invariant_proof_binds_payload() {
    let (mut h, signers, account) = setup(1, 1);
    let signed = Call::transfer(RECIPIENT, U256::from(1u64)).encode();
    let swapped = Call::transfer(RECIPIENT, U256::from(999u64)).encode();

    let command = Command::Execute {
        account,
        operation: sign_operation(&[&signers[0]], 0, &signed),
        payload: swapped.into(),
    };
    assert!(matches!(h.deliver(SOURCE, &command), Err(Error::InvalidProof)));
    assert_eq!(h.ledger.balance_of(&RECIPIENT), U256::ZERO);
}

#[test]
fn invariant_forged_signature_rejected() {
    let (mut h, signers, account) = setup(2, 2);
    let payload = Call::transfer(RECIPIENT, U256::from(1u64)).encode();
    let mut operation = sign_operation(&[&signers[0], &signers[1]], 0, &payload);
    operation.signatures[1].s = B256::repeat_byte(0x01);

    let command = Command::Execute {
        account,
        operation,
        payload: payload.into(),
    };
    assert!(matches!(h.deliver(SOURCE, &command), Err(Error::InvalidSignature(1))));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// Below-threshold submissions never execute and never move the sequence
    #[test]
    fn invariant_threshold_enforced(n in 2u8..=4, shortfall in 1u64..=2) {
        let threshold = n as u64;
        let (mut h, signers, account) = setup(n, threshold);
        let supplied = threshold.saturating_sub(shortfall) as usize;
        let refs: Vec<&LocalSigner> = signers.iter().take(supplied).collect();

        let call = Call::transfer(RECIPIENT, U256::from(1u64));
        let result = h.deliver(SOURCE, &execute_command(account, &refs, 0, &call));
        let is_threshold_error = matches!(result, Err(Error::ThresholdNotMet { .. }));
        prop_assert!(is_threshold_error);
        prop_assert_eq!(h.sequence(&account), 0);
    }

    /// Sequence advances by exactly one per success and never on failure
    #[test]
    fn invariant_sequence_monotonic(outcomes in prop::collection::vec(any::<bool>(), 1..8)) {
        let (mut h, signers, account) = setup(1, 1);
        let mut expected = 0u64;

        for succeed in outcomes {
            // Overspending reverts inside the call
            let amount = if succeed { 1u64 } else { 10_000 };
            let call = Call::transfer(RECIPIENT, U256::from(amount));
            let result = h.deliver(SOURCE, &execute_command(account, &[&signers[0]], expected, &call));

            prop_assert_eq!(result.is_ok(), succeed);
            if succeed {
                expected += 1;
            }
            prop_assert_eq!(h.sequence(&account), expected);
        }
        prop_assert_eq!(h.ledger.balance_of(&RECIPIENT), U256::from(expected));
    }
}

#[test]
fn invariant_gateway_hash_executes_once() {
    use smart_account_core::{ContractCallRequest, DeploymentConfig};

    let mpc = signer(0x33);
    let gateway_address = alloy_primitives::Address::with_last_byte(0x9a);
    let config = DeploymentConfig::new().with_gateway(
        gateway_address,
        alloy_primitives::Address::with_last_byte(0x0b),
        mpc.public_key(),
    );
    let mut h = Harness::with_config(config);
    let (mut gateway, _) = h.config.build_gateway().unwrap().unwrap();

    let mut request = ContractCallRequest {
        r: B256::ZERO,
        s: B256::ZERO,
        source_chain: "neutron".into(),
        source_address: SOURCE.into(),
        destination_chain: "ethereum".into(),
        destination_address: h.entry_point.address(),
        payload: Command::CreateAccount {
            recovery: RECIPIENT,
            signers: vec![signer(1).public_key()],
            threshold: 1,
            bootstrap: None,
        }
        .encode()
        .into(),
    };
    let sig = mpc.sign_prehash(&request.tx_hash()).unwrap();
    request.r = sig.r;
    request.s = sig.s;

    gateway
        .execute_contract_call(&mut h.ledger, &request, &mut h.entry_point)
        .unwrap();

    // Re-signing the same call does not make it new
    for _ in 0..3 {
        let again = mpc.sign_prehash(&request.tx_hash()).unwrap();
        let mut replay = request.clone();
        replay.r = again.r;
        replay.s = again.s;
        let err = gateway
            .execute_contract_call(&mut h.ledger, &replay, &mut h.entry_point)
            .unwrap_err();
        assert!(err.is_replay());
    }
    assert_eq!(gateway.executed_hashes(), vec![request.tx_hash()]);
}
