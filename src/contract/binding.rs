//! Contract bindings and the process-wide binding registry.

use std::collections::HashMap;
use std::sync::Arc;

use ethers::abi::{Abi, Event, Function, StateMutability};
use ethers::types::Address;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::ContractAddresses;
use crate::error::ChainError;
use crate::Result;

/// Identifies one of the deployed TraceMarket contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    Product,
    Marketplace,
    SupplyChain,
    Rewards,
}

impl ContractKind {
    /// Embedded ABI artifact for this contract.
    fn abi_json(self) -> &'static str {
        match self {
            ContractKind::Product => include_str!("../../abi/product.json"),
            ContractKind::Marketplace => include_str!("../../abi/marketplace.json"),
            ContractKind::SupplyChain => include_str!("../../abi/supplychain.json"),
            ContractKind::Rewards => include_str!("../../abi/rewards.json"),
        }
    }

    /// Deployed address of this contract under `contracts`.
    pub(crate) fn address(self, contracts: &ContractAddresses) -> Address {
        match self {
            ContractKind::Product => contracts.product,
            ContractKind::Marketplace => contracts.marketplace,
            ContractKind::SupplyChain => contracts.supply_chain,
            ContractKind::Rewards => contracts.rewards,
        }
    }
}

/// A contract address bound to its parsed ABI.
///
/// Immutable once constructed; method and event lookups borrow straight from
/// the parsed descriptor.
#[derive(Debug, Clone)]
pub struct ContractBinding {
    address: Address,
    abi: Abi,
}

impl ContractBinding {
    /// Parses `abi_json` and binds it to `address`.
    pub fn bind(address: Address, abi_json: &str) -> Result<ContractBinding> {
        let abi: Abi = serde_json::from_str(abi_json).map_err(|e| ChainError::InvalidAbi {
            address,
            reason: e.to_string(),
        })?;
        // serde accepts entries with an empty name; they would be uncallable.
        if abi.functions().any(|f| f.name.is_empty()) || abi.events().any(|e| e.name.is_empty()) {
            return Err(ChainError::InvalidAbi {
                address,
                reason: "ABI entry with an empty name".into(),
            });
        }
        Ok(ContractBinding { address, abi })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Method descriptor by name.
    pub fn method(&self, name: &str) -> Result<&Function> {
        self.abi.function(name).map_err(|_| ChainError::ArgumentError {
            contract: self.address,
            method: name.to_string(),
            reason: "no such method in the contract ABI".into(),
        })
    }

    /// Event descriptor by name.
    pub fn event(&self, name: &str) -> Result<&Event> {
        self.abi.event(name).map_err(|_| ChainError::UnknownEvent {
            name: name.to_string(),
        })
    }

    /// Whether a method is read-only (view or pure).
    pub fn is_view(function: &Function) -> bool {
        matches!(
            function.state_mutability,
            StateMutability::View | StateMutability::Pure
        )
    }
}

/// Lazily builds and caches one binding per contract address.
///
/// Bindings are immutable and independent of the node connection; after a
/// reconnect the cache can simply be cleared and rebuilt on demand.
#[derive(Debug, Default)]
pub struct ContractRegistry {
    bindings: RwLock<HashMap<Address, Arc<ContractBinding>>>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        ContractRegistry {
            bindings: RwLock::new(HashMap::new()),
        }
    }

    /// Binding for one of the deployed contracts, built on first use.
    pub async fn binding(
        &self,
        kind: ContractKind,
        contracts: &ContractAddresses,
    ) -> Result<Arc<ContractBinding>> {
        self.bind(kind.address(contracts), kind.abi_json()).await
    }

    /// Binding for an arbitrary address/ABI pair, cached by address.
    pub async fn bind(&self, address: Address, abi_json: &str) -> Result<Arc<ContractBinding>> {
        {
            let bindings = self.bindings.read().await;
            if let Some(binding) = bindings.get(&address) {
                return Ok(Arc::clone(binding));
            }
        }

        let binding = Arc::new(ContractBinding::bind(address, abi_json)?);
        let mut bindings = self.bindings.write().await;
        // A racing caller may have bound it first; keep the existing one.
        if let Some(existing) = bindings.get(&address) {
            return Ok(Arc::clone(existing));
        }
        debug!(address = ?address, "contract bound");
        bindings.insert(address, Arc::clone(&binding));
        Ok(binding)
    }

    /// Drops every cached binding.
    pub async fn clear(&self) {
        self.bindings.write().await.clear();
    }
}
