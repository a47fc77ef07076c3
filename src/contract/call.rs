//! Read-only method invocation.
//!
//! View calls execute on the node without a transaction, cost nothing and
//! are safe to repeat. Preflight checks (method existence, mutability,
//! arity) fail before any network traffic.

use ethers::abi::Token;
use ethers::types::U256;
use tracing::{debug, instrument};

use super::binding::ContractBinding;
use crate::error::ChainError;
use crate::node::wire::{self, CallRequest, WireClause};
use crate::node::ThorNode;
use crate::Result;

/// Decoded output of a view call.
///
/// A method with a single declared output unwraps to the bare value;
/// multiple outputs keep their declared order and names.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedResult {
    Scalar(Token),
    Record(Vec<(String, Token)>),
}

impl DecodedResult {
    /// All output values in declared order.
    pub fn into_tokens(self) -> Vec<Token> {
        match self {
            DecodedResult::Scalar(token) => vec![token],
            DecodedResult::Record(fields) => {
                fields.into_iter().map(|(_, token)| token).collect()
            }
        }
    }

    /// The single output value, if exactly one was declared.
    pub fn as_scalar(&self) -> Option<&Token> {
        match self {
            DecodedResult::Scalar(token) => Some(token),
            DecodedResult::Record(_) => None,
        }
    }
}

/// Executes a view or pure method and decodes its output.
#[instrument(skip(node, binding, args), fields(contract = ?binding.address()))]
pub async fn call_view(
    node: &dyn ThorNode,
    binding: &ContractBinding,
    method: &str,
    args: &[Token],
) -> Result<DecodedResult> {
    let function = binding.method(method)?;
    if !ContractBinding::is_view(function) {
        return Err(ChainError::ArgumentError {
            contract: binding.address(),
            method: method.to_string(),
            reason: "method is not view or pure".into(),
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
        .map_err(|e| ChainError::ArgumentError {
            contract: binding.address(),
            method: method.to_string(),
            reason: e.to_string(),
        })?;

    let request = CallRequest {
        clauses: vec![WireClause {
            to: Some(wire::to_hex(binding.address().as_bytes())),
            value: wire::u256_hex(U256::zero()),
            data: wire::to_hex(&data),
        }],
        caller: None,
    };
    let outcomes = node.execute_call(request).await?;
    let outcome = outcomes
        .into_iter()
        .next()
        .ok_or_else(|| ChainError::DecodeError {
            context: format!("output of {method}"),
            reason: "node returned no clause outcome".into(),
        })?;
    if outcome.reverted {
        return Err(ChainError::CallReverted {
            contract: binding.address(),
            method: method.to_string(),
            vm_error: outcome.vm_error,
        });
    }

    let raw = wire::parse_hex(&outcome.data, &format!("output of {method}"))?;
    let tokens = function
        .decode_output(&raw)
        .map_err(|e| ChainError::DecodeError {
            context: format!("output of {method}"),
            reason: e.to_string(),
        })?;
    debug!(outputs = tokens.len(), "view call decoded");

    if function.outputs.len() == 1 {
        let token = tokens.into_iter().next().ok_or_else(|| ChainError::DecodeError {
            context: format!("output of {method}"),
            reason: "decoder produced no value".into(),
        })?;
        Ok(DecodedResult::Scalar(token))
    } else {
        let fields = function
            .outputs
            .iter()
            .map(|param| param.name.clone())
            .zip(tokens)
            .collect();
        Ok(DecodedResult::Record(fields))
    }
}
