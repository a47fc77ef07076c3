//! Wallet seam.
//!
//! In the VeChain model the wallet does more than sign: it presents the
//! request to the user, signs the clauses, broadcasts the transaction itself
//! and hands back the transaction id. This layer never sees a private key;
//! it only builds [`SigningRequest`]s and interprets the outcome.

use async_trait::async_trait;
use ethers::types::{Address, H256};

use crate::contract::submit::Clause;
use crate::Result;

/// A signing request forwarded to the connected wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct SigningRequest {
    /// Clauses to execute, in order. This layer always sends exactly one.
    pub clauses: Vec<Clause>,
    /// Address expected to sign.
    pub origin: Address,
    /// Human-readable description shown by the wallet alongside the request.
    pub comment: Option<String>,
}

/// A connected wallet able to authorize and broadcast transactions.
///
/// Implementations map a user decline to [`SignerRejected`], an uncoverable
/// cost to [`InsufficientFunds`], and a transport failure before broadcast to
/// [`NetworkUnavailable`]. Only the last is safe to retry.
///
/// [`SignerRejected`]: crate::ChainError::SignerRejected
/// [`InsufficientFunds`]: crate::ChainError::InsufficientFunds
/// [`NetworkUnavailable`]: crate::ChainError::NetworkUnavailable
#[async_trait]
pub trait Signer: Send + Sync {
    /// Address the wallet signs for.
    fn address(&self) -> Address;

    /// Asks the wallet to sign and broadcast, returning the transaction id.
    async fn sign_and_send(&self, request: SigningRequest) -> Result<H256>;
}
