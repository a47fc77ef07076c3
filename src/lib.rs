//! TraceMarket chain layer.
//!
//! Client-side contract interaction for the TraceMarket marketplace on
//! VeChain: binds contract ABIs, invokes read-only methods, builds and
//! submits single-clause transactions through a connected wallet, polls for
//! receipts with bounded cancellable waits, and fetches and decodes the
//! marketplace's chain events into display-ready domain values.
//!
//! The composition root is [`ChainClient`]: construct it once at startup via
//! [`ChainClient::connect`] (or [`ChainClient::with_node`] for a custom
//! transport) and share it. Operations are independent async calls, safe to
//! run concurrently.

pub mod cancel;
pub mod config;
pub mod contract;
pub mod domain;
pub mod error;
pub mod events;
pub mod node;
pub mod service;
pub mod signer;

pub use cancel::{CancelSource, CancelToken};
pub use config::{ChainConfig, ChainConfigBuilder, ContractAddresses};
pub use contract::{
    await_receipt, call_view, submit, Clause, ClauseOutput, ContractBinding, ContractKind,
    ContractRegistry, DecodedResult, EventLog, PollOptions, Receipt, TransactionHandle,
};
pub use domain::{Listing, ListingKind, Product, SupplyChainEvent, Verification};
pub use error::ChainError;
pub use events::{BlockRange, DomainEvent, EventFilter};
pub use node::{HttpNode, ThorNode};
pub use service::ChainClient;
pub use signer::{Signer, SigningRequest};

pub type Result<T> = std::result::Result<T, ChainError>;
