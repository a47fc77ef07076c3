//! Chain-layer configuration.
//!
//! One [`ChainConfig`] describes everything the client needs: the Thor node
//! to talk to, the deployed contract addresses, and the poll tuning.
//! Construction is explicit (presets, builder, or environment); nothing is
//! read lazily at call time.

use std::env;
use std::time::Duration;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::error::ChainError;
use crate::Result;

/// Default interval between receipt polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default budget for a receipt wait, roughly twelve Thor blocks.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default timeout for a single node request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default reward per accepted submission, in decimal VET.
pub const DEFAULT_REWARD_AMOUNT: &str = "1";

/// Addresses of the deployed TraceMarket contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    /// Product registry; mints product tokens.
    pub product: Address,
    /// Marketplace; listings and sales.
    pub marketplace: Address,
    /// Supply-chain tracker; checkpoints and verifications.
    pub supply_chain: Address,
    /// Reward distributor; submission rewards.
    pub rewards: Address,
}

/// Configuration for the chain layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Base URL of the Thor node REST API.
    pub node_url: String,
    /// Deployed contract addresses.
    pub contracts: ContractAddresses,
    /// Reward paid per accepted submission, in decimal VET.
    pub reward_amount: String,
    /// Interval between receipt polls. `None` uses [`DEFAULT_POLL_INTERVAL`].
    pub poll_interval: Option<Duration>,
    /// Budget for a receipt wait. `None` uses [`DEFAULT_RECEIPT_TIMEOUT`].
    pub receipt_timeout: Option<Duration>,
    /// Timeout for a single node request. `None` uses [`DEFAULT_HTTP_TIMEOUT`].
    pub http_timeout: Option<Duration>,
}

impl ChainConfig {
    /// Configuration for VeChain mainnet.
    pub fn mainnet(contracts: ContractAddresses) -> Self {
        Self::new("https://mainnet.vechain.org", contracts)
    }

    /// Configuration for the VeChain test network.
    pub fn testnet(contracts: ContractAddresses) -> Self {
        Self::new("https://testnet.vechain.org", contracts)
    }

    /// Configuration for a local solo node.
    pub fn solo(contracts: ContractAddresses) -> Self {
        Self::new("http://127.0.0.1:8669", contracts)
    }

    fn new(node_url: &str, contracts: ContractAddresses) -> Self {
        ChainConfig {
            node_url: node_url.to_string(),
            contracts,
            reward_amount: DEFAULT_REWARD_AMOUNT.to_string(),
            poll_interval: None,
            receipt_timeout: None,
            http_timeout: None,
        }
    }

    /// Reads the configuration from `TRACEMARKET_*` environment variables.
    ///
    /// Required: `TRACEMARKET_NODE_URL` plus one address variable per
    /// contract (`_PRODUCT_ADDRESS`, `_MARKETPLACE_ADDRESS`,
    /// `_SUPPLY_CHAIN_ADDRESS`, `_REWARDS_ADDRESS`). Optional:
    /// `TRACEMARKET_REWARD_AMOUNT`, decimal VET.
    pub fn from_env() -> Result<Self> {
        let node_url = require_env("TRACEMARKET_NODE_URL")?;
        let contracts = ContractAddresses {
            product: address_env("TRACEMARKET_PRODUCT_ADDRESS")?,
            marketplace: address_env("TRACEMARKET_MARKETPLACE_ADDRESS")?,
            supply_chain: address_env("TRACEMARKET_SUPPLY_CHAIN_ADDRESS")?,
            rewards: address_env("TRACEMARKET_REWARDS_ADDRESS")?,
        };
        let reward_amount = env::var("TRACEMARKET_REWARD_AMOUNT")
            .unwrap_or_else(|_| DEFAULT_REWARD_AMOUNT.to_string());

        let config = ChainConfig {
            node_url,
            contracts,
            reward_amount,
            poll_interval: None,
            receipt_timeout: None,
            http_timeout: None,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for obvious mistakes before any network use.
    pub fn validate(&self) -> Result<()> {
        if !self.node_url.starts_with("http://") && !self.node_url.starts_with("https://") {
            return Err(ChainError::Configuration(format!(
                "node URL must be http(s), got {:?}",
                self.node_url
            )));
        }
        for (name, address) in [
            ("product", self.contracts.product),
            ("marketplace", self.contracts.marketplace),
            ("supply_chain", self.contracts.supply_chain),
            ("rewards", self.contracts.rewards),
        ] {
            if address == Address::zero() {
                return Err(ChainError::Configuration(format!(
                    "{name} contract address is the zero address"
                )));
            }
        }
        if self.reward_amount.is_empty() {
            return Err(ChainError::Configuration(
                "reward amount is empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn require_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| ChainError::Configuration(format!("{name} is not set")))
}

fn address_env(name: &str) -> Result<Address> {
    let raw = require_env(name)?;
    raw.parse()
        .map_err(|_| ChainError::Configuration(format!("{name} is not a valid address: {raw:?}")))
}

/// Builder for [`ChainConfig`].
#[derive(Debug, Clone)]
pub struct ChainConfigBuilder {
    config: ChainConfig,
}

impl ChainConfigBuilder {
    pub fn new(node_url: &str, contracts: ContractAddresses) -> Self {
        ChainConfigBuilder {
            config: ChainConfig::new(node_url, contracts),
        }
    }

    pub fn reward_amount(mut self, amount: &str) -> Self {
        self.config.reward_amount = amount.to_string();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = Some(interval);
        self
    }

    pub fn receipt_timeout(mut self, timeout: Duration) -> Self {
        self.config.receipt_timeout = Some(timeout);
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.config.http_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<ChainConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
