//! Transaction building and submission.
//!
//! Submission is fire-and-forget: the clause is encoded, the connected
//! wallet signs and broadcasts it, and the caller gets a
//! [`TransactionHandle`] back immediately. Confirmation is a separate,
//! explicit wait on the handle.

use ethers::abi::{StateMutability, Token};
use ethers::types::{Address, H256, U256};
use tracing::{info, instrument};

use super::binding::ContractBinding;
use super::receipt::{await_receipt, PollOptions, Receipt};
use crate::cancel::CancelToken;
use crate::error::ChainError;
use crate::node::ThorNode;
use crate::signer::{Signer, SigningRequest};
use crate::Result;

/// One contract-call unit of a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    /// Target contract.
    pub to: Address,
    /// Native value transferred with the call, in wei.
    pub value: U256,
    /// ABI-encoded call data.
    pub data: Vec<u8>,
    /// Human-readable description shown by the wallet.
    pub comment: Option<String>,
}

/// Handle returned immediately after broadcast.
///
/// The transaction id is the only carrier needed to retrieve the receipt
/// later; the handle itself holds no connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionHandle {
    pub tx_id: H256,
}

impl TransactionHandle {
    /// Polls for this transaction's receipt. See [`await_receipt`].
    pub async fn wait(
        &self,
        node: &dyn ThorNode,
        opts: &PollOptions,
        cancel: &CancelToken,
    ) -> Result<Receipt> {
        await_receipt(node, self.tx_id, opts, cancel).await
    }
}

/// Encodes a state-changing call, has the signer authorize and broadcast it,
/// and returns the handle without waiting for confirmation.
///
/// Not idempotent: a rejected signature must not be resubmitted blindly. A
/// network failure raised before broadcast is safe to retry.
#[instrument(skip(binding, args, signer), fields(contract = ?binding.address()))]
pub async fn submit(
    binding: &ContractBinding,
    method: &str,
    args: &[Token],
    signer: &dyn Signer,
    value: U256,
) -> Result<TransactionHandle> {
    let function = binding.method(method)?;
    if ContractBinding::is_view(function) {
        return Err(ChainError::ArgumentError {
            contract: binding.address(),
            method: method.to_string(),
            reason: "method is read-only; use a view call".into(),
        });
    }
    if !value.is_zero() && !matches!(function.state_mutability, StateMutability::Payable) {
        return Err(ChainError::ArgumentError {
            contract: binding.address(),
            method: method.to_string(),
            reason: "method is not payable but a value was provided".into(),
        });
    }
    if function.inputs.len() != args.len() {
        return Err(ChainError::ArgumentError {
            contract: binding.address(),
            method: method.to_string(),
            reason: format!(
                "expected {} arguments, got {}",
                function.inputs.len(),
                args.len()
            ),
        });
    }

    let data = function
        .encode_input(args)
        .map_err(|e| ChainError::EncodingError {
            contract: binding.address(),
            method: method.to_string(),
            reason: e.to_string(),
        })?;

    let comment = describe_call(method, args);
    let request = SigningRequest {
        clauses: vec![Clause {
            to: binding.address(),
            value,
            data,
            comment: Some(comment.clone()),
        }],
        origin: signer.address(),
        comment: Some(comment),
    };

    let tx_id = signer.sign_and_send(request).await?;
    info!(tx_id = ?tx_id, "transaction submitted");
    Ok(TransactionHandle { tx_id })
}

/// Renders `method(arg, arg, ...)` for wallet display.
fn describe_call(method: &str, args: &[Token]) -> String {
    let rendered: Vec<String> = args.iter().map(render_token).collect();
    format!("{method}({})", rendered.join(", "))
}

fn render_token(token: &Token) -> String {
    match token {
        Token::Address(address) => format!("{address:?}"),
        Token::String(text) => format!("{text:?}"),
        Token::Uint(value) => value.to_string(),
        Token::Bool(flag) => flag.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::testing::MockSigner;

    const TEST_ABI: &str = r#"[
        {
            "type": "function",
            "name": "register",
            "stateMutability": "nonpayable",
            "inputs": [{ "name": "tokenId", "type": "uint256" }],
            "outputs": []
        },
        {
            "type": "function",
            "name": "deposit",
            "stateMutability": "payable",
            "inputs": [{ "name": "tokenId", "type": "uint256" }],
            "outputs": []
        },
        {
            "type": "function",
            "name": "peek",
            "stateMutability": "view",
            "inputs": [],
            "outputs": [{ "name": "", "type": "uint256" }]
        }
    ]"#;

    fn test_binding() -> ContractBinding {
        ContractBinding::bind(Address::from_low_u64_be(9), TEST_ABI).unwrap()
    }

    #[tokio::test]
    async fn submit_builds_single_clause_and_returns_handle() {
        let binding = test_binding();
        let signer = MockSigner::returning(H256::from_low_u64_be(0x77));

        let handle = submit(
            &binding,
            "register",
            &[Token::Uint(U256::from(5u64))],
            &signer,
            U256::zero(),
        )
        .await
        .unwrap();
        assert_eq!(handle.tx_id, H256::from_low_u64_be(0x77));

        let requests = signer.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.origin, signer.address());
        assert_eq!(request.clauses.len(), 1);

        let clause = &request.clauses[0];
        assert_eq!(clause.to, binding.address());
        assert!(clause.value.is_zero());
        let selector = binding.method("register").unwrap().short_signature();
        assert_eq!(&clause.data[..4], &selector[..]);
        assert_eq!(request.comment.as_deref(), Some("register(5)"));
    }

    #[tokio::test]
    async fn value_on_nonpayable_method_is_rejected() {
        let binding = test_binding();
        let signer = MockSigner::new();

        let result = submit(
            &binding,
            "register",
            &[Token::Uint(U256::one())],
            &signer,
            U256::from(10u64),
        )
        .await;

        assert!(matches!(result, Err(ChainError::ArgumentError { .. })));
        assert_eq!(signer.request_count(), 0);
    }

    #[tokio::test]
    async fn payable_method_carries_value() {
        let binding = test_binding();
        let signer = MockSigner::new();
        let value = U256::from_dec_str("1500000000000000000").unwrap();

        submit(
            &binding,
            "deposit",
            &[Token::Uint(U256::one())],
            &signer,
            value,
        )
        .await
        .unwrap();

        let requests = signer.requests.lock().unwrap();
        assert_eq!(requests[0].clauses[0].value, value);
    }

    #[tokio::test]
    async fn view_method_cannot_be_submitted() {
        let binding = test_binding();
        let signer = MockSigner::new();

        let result = submit(&binding, "peek", &[], &signer, U256::zero()).await;
        assert!(matches!(result, Err(ChainError::ArgumentError { .. })));
        assert_eq!(signer.request_count(), 0);
    }

    #[tokio::test]
    async fn argument_type_mismatch_is_an_encoding_error() {
        let binding = test_binding();
        let signer = MockSigner::new();

        let result = submit(
            &binding,
            "register",
            &[Token::Bool(true)],
            &signer,
            U256::zero(),
        )
        .await;

        assert!(matches!(result, Err(ChainError::EncodingError { .. })));
        assert_eq!(signer.request_count(), 0);
    }

    #[tokio::test]
    async fn signer_rejection_passes_through() {
        let binding = test_binding();
        let signer = MockSigner::rejecting(ChainError::SignerRejected {
            reason: "user declined".into(),
        });

        let result = submit(
            &binding,
            "register",
            &[Token::Uint(U256::one())],
            &signer,
            U256::zero(),
        )
        .await;

        assert!(matches!(result, Err(ChainError::SignerRejected { .. })));
        assert_eq!(signer.request_count(), 1);
    }
}
