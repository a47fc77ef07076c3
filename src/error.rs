//! Error taxonomy for the chain layer.
//!
//! Construction, encoding and decoding failures surface immediately and are
//! not retryable. `NetworkUnavailable` is the only retryable class; during a
//! receipt wait it is absorbed until the poll budget runs out, at which point
//! the wait fails with `TransactionTimeout`. A mined-but-reverted receipt is
//! data, never an error.

use std::time::Duration;

use ethers::types::{Address, H256};

/// Errors produced by the chain layer.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The ABI descriptor for a contract could not be parsed or carries
    /// unusable entries.
    #[error("invalid ABI for contract {address:?}: {reason}")]
    InvalidAbi { address: Address, reason: String },

    /// A call violated a method precondition: unknown method, wrong
    /// mutability, or an arity/type mismatch in the arguments.
    #[error("bad arguments for {method} on {contract:?}: {reason}")]
    ArgumentError {
        contract: Address,
        method: String,
        reason: String,
    },

    /// Arguments passed the preflight checks but could not be ABI-encoded
    /// into transaction data.
    #[error("failed to encode {method} on {contract:?}: {reason}")]
    EncodingError {
        contract: Address,
        method: String,
        reason: String,
    },

    /// Chain data did not match the shape the ABI declares. Indicates ABI or
    /// contract drift, not a transient fault.
    #[error("failed to decode {context}: {reason}")]
    DecodeError { context: String, reason: String },

    /// A read-only execution reverted in the VM and produced no output.
    #[error("call to {method} on {contract:?} reverted: {vm_error}")]
    CallReverted {
        contract: Address,
        method: String,
        vm_error: String,
    },

    /// The connected wallet declined to sign the transaction.
    #[error("signer rejected the transaction: {reason}")]
    SignerRejected { reason: String },

    /// The signing account cannot cover the transaction cost.
    #[error("insufficient funds for signer {signer:?}")]
    InsufficientFunds { signer: Address },

    /// The node could not be reached or failed at the transport level.
    /// Safe to retry.
    #[error("node unreachable: {reason}")]
    NetworkUnavailable { reason: String },

    /// No receipt appeared within the poll budget.
    #[error("transaction {tx_id:?} not mined within {waited:?}")]
    TransactionTimeout { tx_id: H256, waited: Duration },

    /// The event name is not in the supported event table.
    #[error("unknown event type {name:?}")]
    UnknownEvent { name: String },

    /// The receipt wait was cancelled by the caller.
    #[error("receipt wait for transaction {tx_id:?} cancelled")]
    Cancelled { tx_id: H256 },

    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ChainError {
    /// Whether retrying the failed operation can reasonably succeed.
    ///
    /// Encoding and decoding failures are final and signer decisions must not
    /// be resubmitted; only transport-level failures are worth a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChainError::NetworkUnavailable { .. })
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(error: reqwest::Error) -> Self {
        ChainError::NetworkUnavailable {
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_failures_are_retryable() {
        let network = ChainError::NetworkUnavailable {
            reason: "connection refused".into(),
        };
        assert!(network.is_retryable());

        let rejected = ChainError::SignerRejected {
            reason: "user declined".into(),
        };
        assert!(!rejected.is_retryable());

        let decode = ChainError::DecodeError {
            context: "output of getProduct".into(),
            reason: "unexpected shape".into(),
        };
        assert!(!decode.is_retryable());

        let timeout = ChainError::TransactionTimeout {
            tx_id: H256::zero(),
            waited: Duration::from_secs(120),
        };
        assert!(!timeout.is_retryable());
    }

    #[test]
    fn display_carries_method_context() {
        let error = ChainError::ArgumentError {
            contract: Address::zero(),
            method: "buyProduct".into(),
            reason: "expected 1 arguments, got 2".into(),
        };
        let rendered = error.to_string();
        assert!(rendered.contains("buyProduct"));
        assert!(rendered.contains("expected 1 arguments, got 2"));
    }
}
