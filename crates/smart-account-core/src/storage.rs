//! Persistence for replay-protection and account state
//!
//! Account sequences, stored authorizations and the gateway's executed-hash
//! set must survive restarts, otherwise old signatures become replayable.
//! This module provides a small key-value interface with two backends and
//! JSON snapshots of the ledger and gateway state:
//!
//! - **MemoryStateStore**: in-process map (testing)
//! - **FileSystemStore**: one JSON file per key in a directory
//!
//! ## Example
//!
//! ```rust,ignore
//! use smart_account_core::storage::{FileSystemStore, LedgerSnapshot};
//!
//! let store = FileSystemStore::new("/var/lib/smart-accounts")?;
//! LedgerSnapshot::capture(&ledger).save(&store, "ledger")?;
//!
//! let ledger = LedgerSnapshot::load(&store, "ledger")?.restore();
//! ```

use crate::account::Account;
use crate::gateway::MpcGateway;
use crate::ledger::Ledger;
use crate::{Error, Result};
use alloy_primitives::{Address, B256, U256};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Key-value store for serialized state
pub trait StateStore: Send + Sync {
    /// Store bytes under `id`, replacing any previous value
    fn put(&self, id: &str, data: &[u8]) -> Result<()>;

    /// Load bytes stored under `id`
    fn get(&self, id: &str) -> Result<Vec<u8>>;

    /// Remove `id` (no error if absent)
    fn delete(&self, id: &str) -> Result<()>;

    /// Whether `id` is stored
    fn exists(&self, id: &str) -> Result<bool>;

    /// All stored ids
    fn list(&self) -> Result<Vec<String>>;
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn put(&self, id: &str, data: &[u8]) -> Result<()> {
        self.entries.write().insert(id.to_string(), data.to_vec());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Vec<u8>> {
        self.entries
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::Storage(format!("{} not found", id)))
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.entries.write().remove(id);
        Ok(())
    }

    fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.entries.read().contains_key(id))
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.entries.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// File system store
#[derive(Debug)]
pub struct FileSystemStore {
    base_path: PathBuf,
}

impl FileSystemStore {
    /// Create a store rooted at `base_path`, creating the directory if needed
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        if !base_path.exists() {
            std::fs::create_dir_all(&base_path)?;
        }
        Ok(Self { base_path })
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        // Sanitize ID to prevent path traversal
        let safe_id = id.replace(['/', '\\', '.', '~'], "_");
        self.base_path.join(format!("{}.json", safe_id))
    }
}

impl StateStore for FileSystemStore {
    fn put(&self, id: &str, data: &[u8]) -> Result<()> {
        let path = self.entry_path(id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }

        std::fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), bytes = data.len(), "Wrote state entry");
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Vec<u8>> {
        let path = self.entry_path(id);
        if !path.exists() {
            return Err(Error::Storage(format!("{} not found", id)));
        }
        Ok(std::fs::read(&path)?)
    }

    fn delete(&self, id: &str) -> Result<()> {
        let path = self.entry_path(id);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.entry_path(id).exists())
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

fn save_json<T: Serialize>(store: &dyn StateStore, id: &str, value: &T) -> Result<()> {
    let data = serde_json::to_vec_pretty(value)?;
    store.put(id, &data)
}

fn load_json<T: DeserializeOwned>(store: &dyn StateStore, id: &str) -> Result<T> {
    let data = store.get(id)?;
    Ok(serde_json::from_slice(&data)?)
}

fn check_version(version: u32) -> Result<()> {
    if version != SNAPSHOT_VERSION {
        return Err(Error::Storage(format!(
            "unsupported snapshot version {} (expected {})",
            version, SNAPSHOT_VERSION
        )));
    }
    Ok(())
}

/// Persisted ledger state
///
/// Foreign contracts are runtime objects and are not part of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Format version
    pub version: u32,
    /// Block timestamp
    pub timestamp: i64,
    /// Non-zero native balances
    pub balances: Vec<(Address, U256)>,
    /// Deployed accounts
    pub accounts: Vec<(Address, Account)>,
}

impl LedgerSnapshot {
    /// Capture the current ledger state
    pub fn capture(ledger: &Ledger) -> Self {
        let mut balances: Vec<(Address, U256)> =
            ledger.balances().map(|(a, v)| (*a, *v)).collect();
        balances.sort_by_key(|(a, _)| *a);

        let mut accounts: Vec<(Address, Account)> = ledger
            .accounts()
            .map(|(a, acc)| (*a, acc.clone()))
            .collect();
        accounts.sort_by_key(|(a, _)| *a);

        Self {
            version: SNAPSHOT_VERSION,
            timestamp: ledger.timestamp(),
            balances,
            accounts,
        }
    }

    /// Rebuild a ledger from the snapshot
    pub fn restore(self) -> Ledger {
        let mut ledger = Ledger::new(self.timestamp);
        for (address, amount) in self.balances {
            ledger.fund(address, amount);
        }
        for (address, account) in self.accounts {
            ledger.insert_account(address, account);
        }
        ledger
    }

    /// Save as JSON under `id`
    pub fn save(&self, store: &dyn StateStore, id: &str) -> Result<()> {
        save_json(store, id, self)
    }

    /// Load from JSON stored under `id`
    pub fn load(store: &dyn StateStore, id: &str) -> Result<Self> {
        let snapshot: Self = load_json(store, id)?;
        check_version(snapshot.version)?;
        Ok(snapshot)
    }
}

/// Persisted gateway replay-protection state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySnapshot {
    /// Format version
    pub version: u32,
    /// Gateway address
    pub gateway: Address,
    /// Executed transaction hashes
    pub executed: Vec<B256>,
}

impl GatewaySnapshot {
    /// Capture the gateway's executed hashes
    pub fn capture(gateway: &MpcGateway) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            gateway: gateway.address(),
            executed: gateway.executed_hashes(),
        }
    }

    /// Mark the snapshot's hashes executed on `gateway`
    pub fn restore_into(self, gateway: &mut MpcGateway) -> Result<()> {
        if gateway.address() != self.gateway {
            return Err(Error::Storage(format!(
                "snapshot belongs to gateway {}, not {}",
                self.gateway,
                gateway.address()
            )));
        }
        gateway.restore_executed(self.executed);
        Ok(())
    }

    /// Save as JSON under `id`
    pub fn save(&self, store: &dyn StateStore, id: &str) -> Result<()> {
        save_json(store, id, self)
    }

    /// Load from JSON stored under `id`
    pub fn load(store: &dyn StateStore, id: &str) -> Result<Self> {
        let snapshot: Self = load_json(store, id)?;
        check_version(snapshot.version)?;
        Ok(snapshot)
    }
}
