//! Receipt polling.
//!
//! A receipt wait is a plain awaited loop, not a spawned task: dropping the
//! future stops the polling, nothing leaks. The wait is bounded by a total
//! timeout and can be interrupted through a [`CancelToken`]. Transport
//! failures are absorbed and retried on the next tick; they only surface,
//! as `TransactionTimeout`, once the budget is exhausted.

use std::time::Duration;

use ethers::types::{Address, H256};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, instrument, warn};

use crate::cancel::CancelToken;
use crate::config::{DEFAULT_POLL_INTERVAL, DEFAULT_RECEIPT_TIMEOUT};
use crate::error::ChainError;
use crate::node::wire::{self, LogPayload, ReceiptPayload};
use crate::node::ThorNode;
use crate::Result;

/// Tuning for a receipt wait.
#[derive(Debug, Clone, Copy)]
pub struct PollOptions {
    /// Interval between polls.
    pub interval: Duration,
    /// Total budget before the wait fails with `TransactionTimeout`.
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        PollOptions {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_RECEIPT_TIMEOUT,
        }
    }
}

impl PollOptions {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// One event log carried by a receipt output.
#[derive(Debug, Clone, PartialEq)]
pub struct EventLog {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
}

impl EventLog {
    pub(crate) fn from_payload(payload: &LogPayload) -> Result<EventLog> {
        let mut topics = Vec::with_capacity(payload.topics.len());
        for topic in &payload.topics {
            topics.push(wire::parse_h256(topic, "event log topic")?);
        }
        Ok(EventLog {
            address: wire::parse_address(&payload.address, "event log address")?,
            topics,
            data: wire::parse_hex(&payload.data, "event log data")?,
        })
    }
}

/// Per-clause output of a mined transaction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClauseOutput {
    /// Set when the clause deployed a contract.
    pub contract_address: Option<Address>,
    pub events: Vec<EventLog>,
}

/// On-chain confirmation record for a mined transaction.
///
/// Terminal: observed once and never mutated. `reverted = true` is a
/// successful observation of failed execution; interpreting it is the
/// caller's business.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub tx_id: H256,
    pub reverted: bool,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub gas_used: u64,
    /// Raw event logs, one entry per clause.
    pub outputs: Vec<ClauseOutput>,
}

impl Receipt {
    fn from_payload(tx_id: H256, payload: ReceiptPayload) -> Result<Receipt> {
        let mut outputs = Vec::with_capacity(payload.outputs.len());
        for output in payload.outputs {
            let mut events = Vec::with_capacity(output.events.len());
            for event in &output.events {
                events.push(EventLog::from_payload(event)?);
            }
            let contract_address = match output.contract_address.as_deref() {
                Some(raw) => Some(wire::parse_address(raw, "receipt contract address")?),
                None => None,
            };
            outputs.push(ClauseOutput {
                contract_address,
                events,
            });
        }
        Ok(Receipt {
            tx_id,
            reverted: payload.reverted,
            block_number: payload.meta.block_number,
            block_timestamp: payload.meta.block_timestamp,
            gas_used: payload.gas_used,
            outputs,
        })
    }

    /// Every event log, in clause order.
    pub fn logs(&self) -> impl Iterator<Item = &EventLog> {
        self.outputs.iter().flat_map(|output| output.events.iter())
    }
}

/// Polls the node until the transaction is mined, the budget runs out, or
/// the caller cancels.
///
/// The first poll happens immediately, then once per `opts.interval`.
#[instrument(skip(node, opts, cancel), fields(tx_id = ?tx_id))]
pub async fn await_receipt(
    node: &dyn ThorNode,
    tx_id: H256,
    opts: &PollOptions,
    cancel: &CancelToken,
) -> Result<Receipt> {
    let started = Instant::now();
    let deadline = started + opts.timeout;

    loop {
        if cancel.is_cancelled() {
            return Err(ChainError::Cancelled { tx_id });
        }

        match node.transaction_receipt(tx_id).await {
            Ok(Some(payload)) => {
                let receipt = Receipt::from_payload(tx_id, payload)?;
                debug!(
                    block = receipt.block_number,
                    reverted = receipt.reverted,
                    "receipt observed"
                );
                return Ok(receipt);
            }
            Ok(None) => debug!("transaction not yet mined"),
            // Transient; the remaining budget covers the retry.
            Err(error) if error.is_retryable() => warn!(%error, "receipt poll failed"),
            Err(error) => return Err(error),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(ChainError::TransactionTimeout {
                tx_id,
                waited: started.elapsed(),
            });
        }

        let wake = std::cmp::min(now + opts.interval, deadline);
        tokio::select! {
            _ = cancel.cancelled() => return Err(ChainError::Cancelled { tx_id }),
            _ = sleep_until(wake) => {}
        }
        if Instant::now() >= deadline {
            return Err(ChainError::TransactionTimeout {
                tx_id,
                waited: started.elapsed(),
            });
        }
    }
}
