//! Deployment configuration
//!
//! A [`DeploymentConfig`] describes one deployment of the protocol: the
//! entry point with its owner and executors, the account factory, and
//! optionally an MPC gateway with its trusted key. It is loaded from JSON
//! and turned into live components with [`DeploymentConfig::build_entry_point`]
//! and [`DeploymentConfig::build_gateway`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use smart_account_core::config::DeploymentConfig;
//! use smart_account_core::entry_point::InMemoryChannel;
//!
//! let config = DeploymentConfig::from_json(&std::fs::read_to_string("deployment.json")?)?;
//! let mut ledger = smart_account_core::Ledger::new(0);
//! let entry_point = config.build_entry_point(&mut ledger, Box::new(InMemoryChannel::new()))?;
//! ```

use crate::crypto::VerifierContext;
use crate::entry_point::{EntryPoint, MessageChannel};
use crate::gateway::MpcGateway;
use crate::ledger::Ledger;
use crate::types::PublicKey;
use crate::{Error, Result};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Entry point settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPointConfig {
    /// Entry point address
    pub address: Address,
    /// Owner allowed to manage executors
    pub owner: Address,
    /// Addresses allowed to submit payloads directly
    #[serde(default)]
    pub executors: Vec<Address>,
}

/// Account factory settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryConfig {
    /// Factory address (part of every account address)
    pub address: Address,
}

/// MPC gateway settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway address
    pub address: Address,
    /// Owner allowed to rotate the MPC key
    pub owner: Address,
    /// Trusted MPC public key
    pub mpc_public_key: PublicKey,
}

/// Complete deployment description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Entry point
    pub entry_point: EntryPointConfig,
    /// Account factory
    pub factory: FactoryConfig,
    /// Optional MPC gateway
    #[serde(default)]
    pub gateway: Option<GatewayConfig>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            entry_point: EntryPointConfig {
                address: Address::with_last_byte(0xe1),
                owner: Address::with_last_byte(0x01),
                executors: Vec::new(),
            },
            factory: FactoryConfig {
                address: Address::with_last_byte(0xfa),
            },
            gateway: None,
        }
    }
}

impl DeploymentConfig {
    /// Create a config with default addresses
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry point address and owner
    pub fn with_entry_point(mut self, address: Address, owner: Address) -> Self {
        self.entry_point.address = address;
        self.entry_point.owner = owner;
        self
    }

    /// Add an executor
    pub fn with_executor(mut self, executor: Address) -> Self {
        if !self.entry_point.executors.contains(&executor) {
            self.entry_point.executors.push(executor);
        }
        self
    }

    /// Set the factory address
    pub fn with_factory(mut self, address: Address) -> Self {
        self.factory.address = address;
        self
    }

    /// Configure an MPC gateway
    ///
    /// The gateway is registered as an executor of the entry point.
    pub fn with_gateway(mut self, address: Address, owner: Address, mpc_public_key: PublicKey) -> Self {
        self.gateway = Some(GatewayConfig {
            address,
            owner,
            mpc_public_key,
        });
        self.with_executor(address)
    }

    /// Parse from JSON and validate
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check addresses and keys
    pub fn validate(&self) -> Result<()> {
        let mut named = vec![
            ("entry_point.address", self.entry_point.address),
            ("entry_point.owner", self.entry_point.owner),
            ("factory.address", self.factory.address),
        ];
        if let Some(gateway) = &self.gateway {
            named.push(("gateway.address", gateway.address));
            named.push(("gateway.owner", gateway.owner));
        }
        for (name, address) in named {
            if address.is_zero() {
                return Err(Error::InvalidConfig(format!("{} must not be zero", name)));
            }
        }

        if self.entry_point.address == self.factory.address {
            return Err(Error::InvalidConfig(
                "entry point and factory share an address".into(),
            ));
        }
        if self.entry_point.executors.iter().any(|executor| executor.is_zero()) {
            return Err(Error::InvalidConfig("executor must not be zero".into()));
        }
        if let Some(gateway) = &self.gateway {
            gateway
                .mpc_public_key
                .validate()
                .map_err(|e| Error::InvalidConfig(format!("gateway.mpc_public_key: {}", e)))?;
        }
        Ok(())
    }

    /// Build the entry point and register the configured executors
    pub fn build_entry_point(
        &self,
        ledger: &mut Ledger,
        channel: Box<dyn MessageChannel>,
    ) -> Result<EntryPoint> {
        self.validate()?;
        let config = &self.entry_point;
        let mut entry_point =
            EntryPoint::new(config.address, config.owner, self.factory.address, channel);
        for executor in &config.executors {
            entry_point.set_executor(ledger, config.owner, *executor, true)?;
        }
        info!(
            entry_point = %config.address,
            factory = %self.factory.address,
            executors = config.executors.len(),
            "Built entry point"
        );
        Ok(entry_point)
    }

    /// Build the gateway and its key registry, if configured
    pub fn build_gateway(&self) -> Result<Option<(MpcGateway, Arc<VerifierContext>)>> {
        let Some(config) = &self.gateway else {
            return Ok(None);
        };
        let context = Arc::new(VerifierContext::new(config.owner, config.mpc_public_key)?);
        let gateway = MpcGateway::new(config.address, context.clone());
        info!(gateway = %config.address, "Built MPC gateway");
        Ok(Some((gateway, context)))
    }
}
