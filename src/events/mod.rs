//! Event subscription: one-shot historical fetch plus receipt decoding.
//!
//! A single static table maps each supported event name to the contract that
//! emits it and its decode rule. Filter construction and decoding share the
//! table, so an unsupported name is one lookup miss and never reaches the
//! network, and fetching and receipt decoding can never disagree about an
//! event's shape.

mod decode;

pub use decode::DomainEvent;

use ethers::abi::Event as AbiEvent;
use ethers::types::{Address, H256};
use tracing::{debug, instrument};

use crate::config::ContractAddresses;
use crate::contract::binding::{ContractKind, ContractRegistry};
use crate::contract::receipt::{EventLog, Receipt};
use crate::error::ChainError;
use crate::node::wire::{self, EventCriteria, LogQuery, QueryOptions, QueryRange};
use crate::node::ThorNode;
use crate::Result;

/// Upper bound on logs returned by one fetch.
const MAX_LOGS_PER_QUERY: u64 = 1000;

/// Block range of an event query. `to = None` means the latest block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockRange {
    pub from: u64,
    pub to: Option<u64>,
}

impl BlockRange {
    /// Genesis to latest.
    pub fn all() -> BlockRange {
        BlockRange::default()
    }

    pub fn since(from: u64) -> BlockRange {
        BlockRange { from, to: None }
    }

    pub fn between(from: u64, to: u64) -> BlockRange {
        BlockRange { from, to: Some(to) }
    }
}

/// Filter criteria resolved for one supported event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub contract_address: Address,
    pub event_name: &'static str,
    pub topic0: H256,
    pub range: BlockRange,
}

impl EventFilter {
    fn to_query(&self) -> LogQuery {
        LogQuery {
            range: QueryRange {
                unit: "block".into(),
                from: self.range.from,
                to: self.range.to,
            },
            options: Some(QueryOptions {
                offset: 0,
                limit: MAX_LOGS_PER_QUERY,
            }),
            criteria_set: vec![EventCriteria {
                address: wire::to_hex(self.contract_address.as_bytes()),
                topic0: Some(wire::to_hex(self.topic0.as_bytes())),
            }],
            order: "asc".into(),
        }
    }
}

type DecodeFn = fn(&AbiEvent, &EventLog) -> Result<DomainEvent>;

/// Descriptor tying an event name to its emitting contract and decode rule.
struct EventDescriptor {
    name: &'static str,
    contract: ContractKind,
    decode: DecodeFn,
}

/// Every event type this layer understands.
const SUPPORTED_EVENTS: &[EventDescriptor] = &[
    EventDescriptor {
        name: "ProductCreated",
        contract: ContractKind::Product,
        decode: decode::decode_product_created,
    },
    EventDescriptor {
        name: "Listed",
        contract: ContractKind::Marketplace,
        decode: decode::decode_listed,
    },
    EventDescriptor {
        name: "Sale",
        contract: ContractKind::Marketplace,
        decode: decode::decode_sale,
    },
];

fn lookup(name: &str) -> Result<&'static EventDescriptor> {
    SUPPORTED_EVENTS
        .iter()
        .find(|descriptor| descriptor.name == name)
        .ok_or_else(|| ChainError::UnknownEvent {
            name: name.to_string(),
        })
}

/// Fetches and decodes the historical `name` events over `range`, oldest
/// first.
///
/// One-shot: a fresh call re-fetches. This is not a live subscription.
#[instrument(skip(node, registry, contracts))]
pub async fn fetch_events(
    node: &dyn ThorNode,
    registry: &ContractRegistry,
    contracts: &ContractAddresses,
    name: &str,
    range: BlockRange,
) -> Result<Vec<DomainEvent>> {
    let descriptor = lookup(name)?;
    let binding = registry.binding(descriptor.contract, contracts).await?;
    let event = binding.event(descriptor.name)?;
    let filter = EventFilter {
        contract_address: binding.address(),
        event_name: descriptor.name,
        topic0: event.signature(),
        range,
    };

    let payloads = node.event_logs(filter.to_query()).await?;
    debug!(count = payloads.len(), "event logs fetched");

    let mut events = Vec::with_capacity(payloads.len());
    for payload in &payloads {
        let log = EventLog::from_payload(payload)?;
        events.push((descriptor.decode)(event, &log)?);
    }
    Ok(events)
}

/// Decodes the supported events a receipt carries, in clause order.
///
/// Logs from other contracts, or with signatures outside the supported
/// table, are skipped rather than failed: receipts routinely carry
/// bookkeeping events this layer does not model.
pub async fn decode_receipt_events(
    registry: &ContractRegistry,
    contracts: &ContractAddresses,
    receipt: &Receipt,
) -> Result<Vec<DomainEvent>> {
    let mut events = Vec::new();
    for log in receipt.logs() {
        for descriptor in SUPPORTED_EVENTS {
            let binding = registry.binding(descriptor.contract, contracts).await?;
            if binding.address() != log.address {
                continue;
            }
            let event = binding.event(descriptor.name)?;
            if log.topics.first() != Some(&event.signature()) {
                continue;
            }
            events.push((descriptor.decode)(event, log)?);
        }
    }
    Ok(events)
}
