//! Integration tests for deployment config and state snapshots

use crate::common::{Harness, RECIPIENT, SOURCE, execute_command, sign_operation, signer};
use alloy_primitives::{Address, U256};
use smart_account_core::{
    Call, Command, DeploymentConfig, Error, FileSystemStore, GatewaySnapshot, InMemoryChannel,
    LedgerSnapshot, MemoryStateStore, Predicate, StateStore, account::authorization_id,
};

fn temp_dir() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("smart-account-it-{}", rand::random::<u64>()))
}

#[test]
fn test_config_file_drives_deployment() {
    let dir = temp_dir();
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("deployment.json");

    let config = DeploymentConfig::new()
        .with_entry_point(Address::repeat_byte(0xe1), Address::repeat_byte(0x01))
        .with_executor(Address::repeat_byte(0x52))
        .with_gateway(
            Address::repeat_byte(0x9a),
            Address::repeat_byte(0x0b),
            signer(0x33).public_key(),
        );
    std::fs::write(&path, config.to_json().unwrap()).unwrap();

    let loaded = DeploymentConfig::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(loaded, config);

    let h = Harness::with_config(loaded);
    assert_eq!(h.entry_point.address(), Address::repeat_byte(0xe1));
    assert!(h.entry_point.is_executor(&Address::repeat_byte(0x52)));
    assert!(h.entry_point.is_executor(&Address::repeat_byte(0x9a)));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_invalid_config_rejected() {
    let json = r#"{
        "entry_point": {
            "address": "0x00000000000000000000000000000000000000e1",
            "owner": "0x0000000000000000000000000000000000000000"
        },
        "factory": { "address": "0x00000000000000000000000000000000000000fa" }
    }"#;
    assert!(matches!(
        DeploymentConfig::from_json(json),
        Err(Error::InvalidConfig(_))
    ));
    assert!(DeploymentConfig::from_json("{").is_err());
}

#[test]
fn test_restart_preserves_replay_protection() {
    let dir = temp_dir();
    let store = FileSystemStore::new(&dir).unwrap();

    let mut h = Harness::new();
    let owner = signer(1);
    let account = h.create_account(SOURCE, &[&owner], 1);
    h.ledger.fund(account, U256::from(100u64));

    let first = execute_command(account, &[&owner], 0, &Call::transfer(RECIPIENT, U256::from(10u64)));
    h.deliver(SOURCE, &first).unwrap();

    let operation = sign_operation(&[&owner], 1, b"");
    let id = authorization_id(&operation.message_hash);
    let expiry = (h.ledger.timestamp() + 86_400) as u64;
    h.deliver(
        SOURCE,
        &Command::CreateAuthorization {
            account,
            operation,
            expiry,
            predicates: vec![Predicate::daily_sum_less_or_equal(32, 32, U256::from(5u64)).unwrap()],
            payload: Default::default(),
        },
    )
    .unwrap();
    let spend = |value: u64| Command::ExecuteAuthorized {
        account,
        authorization_id: id,
        payload: Call::transfer(RECIPIENT, U256::from(value)).encode().into(),
    };
    h.deliver(SOURCE, &spend(4)).unwrap();

    LedgerSnapshot::capture(&h.ledger).save(&store, "ledger").unwrap();
    assert_eq!(store.list().unwrap(), vec!["ledger".to_string()]);

    // Fresh process
    let mut ledger = LedgerSnapshot::load(&store, "ledger").unwrap().restore();
    let channel = InMemoryChannel::new();
    let mut entry_point = h
        .config
        .build_entry_point(&mut ledger, Box::new(channel.clone()))
        .unwrap();
    assert_eq!(entry_point.factory_mut().reindex(&ledger), 1);

    let mut restarted = Harness::from_parts(h.config.clone(), ledger, entry_point, channel);
    assert_eq!(restarted.sequence(&account), 2);
    assert_eq!(restarted.ledger.balance_of(&account), U256::from(86u64));

    let err = restarted.deliver(SOURCE, &first).unwrap_err();
    assert!(matches!(err, Error::SequenceMismatch { expected: 2, actual: 0 }));

    // Daily total survived the restart
    assert!(matches!(
        restarted.deliver(SOURCE, &spend(2)),
        Err(Error::PredicateViolation { .. })
    ));
    restarted.deliver(SOURCE, &spend(1)).unwrap();

    // Factory lookup still finds the existing account
    assert_eq!(restarted.create_account(SOURCE, &[&owner], 1), account);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_gateway_snapshot_round_trip() {
    let mpc = signer(0x33);
    let config = DeploymentConfig::new().with_gateway(
        Address::repeat_byte(0x9a),
        Address::repeat_byte(0x0b),
        mpc.public_key(),
    );
    let (mut gateway, _) = config.build_gateway().unwrap().unwrap();
    gateway.restore_executed([alloy_primitives::B256::repeat_byte(7)]);

    let store = MemoryStateStore::new();
    GatewaySnapshot::capture(&gateway).save(&store, "gateway").unwrap();

    let (mut restored, _) = config.build_gateway().unwrap().unwrap();
    GatewaySnapshot::load(&store, "gateway")
        .unwrap()
        .restore_into(&mut restored)
        .unwrap();
    assert_eq!(restored.executed_hashes(), gateway.executed_hashes());
}
