//! Node access.
//!
//! [`ThorNode`] is the narrow surface this layer needs from a Thor node:
//! best-block lookup, clause execution, receipt retrieval and log queries.
//! [`HttpNode`] implements it over the REST API; tests substitute scripted
//! doubles.

mod http;
pub mod wire;

pub use http::HttpNode;

use async_trait::async_trait;
use ethers::types::H256;

use crate::Result;
use wire::{BlockSummary, CallOutcome, CallRequest, LogPayload, LogQuery, ReceiptPayload};

/// Read/submit surface of a Thor node.
#[async_trait]
pub trait ThorNode: Send + Sync {
    /// Best (latest) block summary.
    async fn best_block(&self) -> Result<BlockSummary>;

    /// Executes clauses without a transaction; one outcome per clause.
    async fn execute_call(&self, request: CallRequest) -> Result<Vec<CallOutcome>>;

    /// Receipt for a transaction, or `None` while it is not yet mined.
    async fn transaction_receipt(&self, tx_id: H256) -> Result<Option<ReceiptPayload>>;

    /// Event logs matching a filter query.
    async fn event_logs(&self, query: LogQuery) -> Result<Vec<LogPayload>>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted node double shared by the unit tests.

    use super::*;
    use crate::error::ChainError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub(crate) struct MockNode {
        pub call_outcomes: Mutex<VecDeque<Result<Vec<CallOutcome>>>>,
        pub receipts: Mutex<VecDeque<Result<Option<ReceiptPayload>>>>,
        pub logs: Mutex<VecDeque<Result<Vec<LogPayload>>>>,
        pub call_requests: Mutex<Vec<CallRequest>>,
        pub log_queries: Mutex<Vec<LogQuery>>,
        pub receipt_polls: AtomicUsize,
    }

    impl MockNode {
        pub fn new() -> Self {
            MockNode {
                call_outcomes: Mutex::new(VecDeque::new()),
                receipts: Mutex::new(VecDeque::new()),
                logs: Mutex::new(VecDeque::new()),
                call_requests: Mutex::new(Vec::new()),
                log_queries: Mutex::new(Vec::new()),
                receipt_polls: AtomicUsize::new(0),
            }
        }

        pub fn push_call_outcome(&self, outcome: Result<Vec<CallOutcome>>) {
            self.call_outcomes.lock().unwrap().push_back(outcome);
        }

        pub fn push_receipt(&self, receipt: Result<Option<ReceiptPayload>>) {
            self.receipts.lock().unwrap().push_back(receipt);
        }

        pub fn push_logs(&self, logs: Result<Vec<LogPayload>>) {
            self.logs.lock().unwrap().push_back(logs);
        }

        pub fn call_count(&self) -> usize {
            self.call_requests.lock().unwrap().len()
        }

        pub fn poll_count(&self) -> usize {
            self.receipt_polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ThorNode for MockNode {
        async fn best_block(&self) -> Result<BlockSummary> {
            Ok(BlockSummary {
                number: 100,
                id: "0x0000006400000000000000000000000000000000000000000000000000000000"
                    .to_string(),
                timestamp: 1_700_000_000,
            })
        }

        async fn execute_call(&self, request: CallRequest) -> Result<Vec<CallOutcome>> {
            self.call_requests.lock().unwrap().push(request);
            match self.call_outcomes.lock().unwrap().pop_front() {
                Some(outcome) => outcome,
                None => Err(ChainError::NetworkUnavailable {
                    reason: "mock has no scripted call outcome".into(),
                }),
            }
        }

        async fn transaction_receipt(&self, _tx_id: H256) -> Result<Option<ReceiptPayload>> {
            self.receipt_polls.fetch_add(1, Ordering::SeqCst);
            match self.receipts.lock().unwrap().pop_front() {
                Some(receipt) => receipt,
                // Out of script: still pending.
                None => Ok(None),
            }
        }

        async fn event_logs(&self, query: LogQuery) -> Result<Vec<LogPayload>> {
            self.log_queries.lock().unwrap().push(query);
            match self.logs.lock().unwrap().pop_front() {
                Some(logs) => logs,
                None => Ok(Vec::new()),
            }
        }
    }
}
