//! Unit tests for deterministic account deployment

use crate::common::{RECOVERY, SOURCE, signer};
use alloy_primitives::{Address, B256};
use smart_account_core::{
    AccountFactory, AccountKey, BootstrapProof, Error, Event, Ledger, keccak256_hash,
    origin_binding,
};

const FACTORY: Address = Address::with_last_byte(0xfa);
const ENTRY_POINT: Address = Address::with_last_byte(0xe1);

fn key(seeds: &[u8], threshold: u64) -> AccountKey {
    AccountKey::new(
        seeds.iter().map(|s| signer(*s).public_key()).collect(),
        origin_binding(SOURCE),
        threshold,
    )
}

#[test]
fn test_address_depends_on_every_key_part() {
    let factory = AccountFactory::new(FACTORY, ENTRY_POINT);
    let base = factory.compute_address(&key(&[1, 2], 1));

    assert_eq!(base, factory.compute_address(&key(&[1, 2], 1)));
    assert_ne!(base, factory.compute_address(&key(&[1, 2], 2)));
    assert_ne!(base, factory.compute_address(&key(&[2, 1], 1)));

    let mut other_origin = key(&[1, 2], 1);
    other_origin.origin_binding = origin_binding("neutron1other");
    assert_ne!(base, factory.compute_address(&other_origin));

    let other_factory = AccountFactory::new(Address::with_last_byte(0xfb), ENTRY_POINT);
    assert_ne!(base, other_factory.compute_address(&key(&[1, 2], 1)));
}

#[test]
fn test_create_is_idempotent() {
    let mut ledger = Ledger::new(0);
    let mut factory = AccountFactory::new(FACTORY, ENTRY_POINT);

    let first = factory
        .create_account(&mut ledger, RECOVERY, key(&[1, 2], 2), None)
        .unwrap();
    let second = factory
        .create_account(&mut ledger, Address::repeat_byte(0x99), key(&[1, 2], 2), None)
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(factory.account_count(), 1);
    assert_eq!(ledger.account(&first).unwrap().recovery(), RECOVERY);
    let created = ledger
        .events()
        .iter()
        .filter(|e| matches!(e, Event::AccountCreated { .. }))
        .count();
    assert_eq!(created, 1);
}

#[test]
fn test_registry_by_signer() {
    let mut ledger = Ledger::new(0);
    let mut factory = AccountFactory::new(FACTORY, ENTRY_POINT);

    let solo = factory
        .create_account(&mut ledger, RECOVERY, key(&[1], 1), None)
        .unwrap();
    let shared = factory
        .create_account(&mut ledger, RECOVERY, key(&[1, 2], 2), None)
        .unwrap();

    assert_eq!(factory.get_accounts(&signer(1).public_key()), &[solo, shared]);
    assert_eq!(factory.get_accounts(&signer(2).public_key()), &[shared]);
    assert!(factory.get_accounts(&signer(3).public_key()).is_empty());
    assert_eq!(factory.get_account(&key(&[1], 1)), Some(solo));
}

#[test]
fn test_invalid_signer_sets() {
    let mut ledger = Ledger::new(0);
    let mut factory = AccountFactory::new(FACTORY, ENTRY_POINT);

    for bad in [key(&[], 1), key(&[1], 0), key(&[1], 2), key(&[1, 1], 1)] {
        assert!(factory.create_account(&mut ledger, RECOVERY, bad, None).is_err());
    }
    assert_eq!(factory.account_count(), 0);
    assert_eq!(ledger.accounts().count(), 0);
}

#[test]
fn test_bootstrap_proof_checked_against_first_signer() {
    let mut ledger = Ledger::new(0);
    let mut factory = AccountFactory::new(FACTORY, ENTRY_POINT);
    let hash = B256::from(keccak256_hash(b"bootstrap"));

    let by_second = signer(2).sign_prehash(&hash).unwrap();
    let wrong = BootstrapProof {
        message_hash: hash,
        r: by_second.r,
        s: by_second.s,
    };
    assert!(matches!(
        factory.create_account(&mut ledger, RECOVERY, key(&[1, 2], 1), Some(&wrong)),
        Err(Error::InvalidSignature(0))
    ));

    let by_first = signer(1).sign_prehash(&hash).unwrap();
    let proof = BootstrapProof {
        message_hash: hash,
        r: by_first.r,
        s: by_first.s,
    };
    assert!(factory
        .create_account(&mut ledger, RECOVERY, key(&[1, 2], 1), Some(&proof))
        .is_ok());
}

#[test]
fn test_reindex_after_restart() {
    let mut ledger = Ledger::new(0);
    let mut factory = AccountFactory::new(FACTORY, ENTRY_POINT);
    let a = factory
        .create_account(&mut ledger, RECOVERY, key(&[1], 1), None)
        .unwrap();
    factory
        .create_account(&mut ledger, RECOVERY, key(&[2, 3], 2), None)
        .unwrap();

    let mut restarted = AccountFactory::new(FACTORY, ENTRY_POINT);
    assert_eq!(restarted.reindex(&ledger), 2);
    assert_eq!(restarted.get_account(&key(&[1], 1)), Some(a));

    // Accounts derived by another factory are not adopted
    let mut foreign = AccountFactory::new(Address::with_last_byte(0xfb), ENTRY_POINT);
    assert_eq!(foreign.reindex(&ledger), 0);
}
