//! Wire types for the Thor node REST API.
//!
//! Thin serde mirrors of the JSON the node speaks; hex decoding into typed
//! values happens at the boundary into the rest of the crate. Field names
//! follow the node's casing, including the `blockID`/`txID` outliers.

use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use crate::error::ChainError;
use crate::Result;

/// Summary of a block, from `GET /blocks/best`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSummary {
    pub number: u64,
    pub id: String,
    pub timestamp: u64,
}

/// One clause of a call or transaction, in wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireClause {
    pub to: Option<String>,
    pub value: String,
    pub data: String,
}

/// Body of `POST /accounts/*`: executes clauses without a transaction.
#[derive(Debug, Clone, Serialize)]
pub struct CallRequest {
    pub clauses: Vec<WireClause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,
}

/// Outcome of one executed clause.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallOutcome {
    pub data: String,
    pub reverted: bool,
    #[serde(default)]
    pub vm_error: String,
    #[serde(default)]
    pub gas_used: u64,
}

/// Receipt payload from `GET /transactions/{id}/receipt`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptPayload {
    pub gas_used: u64,
    pub reverted: bool,
    pub meta: ReceiptMeta,
    #[serde(default)]
    pub outputs: Vec<OutputPayload>,
}

/// Block and origin metadata attached to a receipt.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptMeta {
    #[serde(rename = "blockID")]
    pub block_id: String,
    #[serde(rename = "blockNumber")]
    pub block_number: u64,
    #[serde(rename = "blockTimestamp")]
    pub block_timestamp: u64,
    #[serde(rename = "txID")]
    pub tx_id: String,
    #[serde(rename = "txOrigin")]
    pub tx_origin: String,
}

/// Per-clause output inside a receipt.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputPayload {
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub events: Vec<LogPayload>,
}

/// One event log, from a receipt or from `POST /logs/event`.
#[derive(Debug, Clone, Deserialize)]
pub struct LogPayload {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
}

/// Body of `POST /logs/event`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    pub range: QueryRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<QueryOptions>,
    pub criteria_set: Vec<EventCriteria>,
    pub order: String,
}

/// Block range of a log query. `to = None` means the node's best block.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRange {
    pub unit: String,
    pub from: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<u64>,
}

/// Pagination window of a log query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOptions {
    pub offset: u64,
    pub limit: u64,
}

/// Address and topic filter for one event type.
#[derive(Debug, Clone, Serialize)]
pub struct EventCriteria {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic0: Option<String>,
}

/// Renders bytes as `0x`-prefixed lowercase hex.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Renders a U256 as the minimal `0x` hex the node expects for values.
pub(crate) fn u256_hex(value: U256) -> String {
    format!("0x{value:x}")
}

/// Decodes a `0x`-prefixed hex payload.
pub(crate) fn parse_hex(raw: &str, context: &str) -> Result<Vec<u8>> {
    hex::decode(raw.trim_start_matches("0x")).map_err(|e| ChainError::DecodeError {
        context: context.to_string(),
        reason: format!("invalid hex {raw:?}: {e}"),
    })
}

pub(crate) fn parse_h256(raw: &str, context: &str) -> Result<H256> {
    raw.parse().map_err(|_| ChainError::DecodeError {
        context: context.to_string(),
        reason: format!("invalid 32-byte hex {raw:?}"),
    })
}

pub(crate) fn parse_address(raw: &str, context: &str) -> Result<Address> {
    raw.parse().map_err(|_| ChainError::DecodeError {
        context: context.to_string(),
        reason: format!("invalid address {raw:?}"),
    })
}
