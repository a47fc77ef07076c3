//! The chain client facade.
//!
//! One configured [`ChainClient`] per process, constructed explicitly at
//! startup and shared; nothing connects at import time. Every operation is
//! an independent async call, safe to run concurrently: reads go straight
//! to the node, writes go through the connected signer and return a
//! [`TransactionHandle`] without waiting for confirmation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ethers::abi::Token;
use ethers::types::{Address, U256};
use tracing::{info, instrument};

use crate::cancel::CancelToken;
use crate::config::{
    ChainConfig, DEFAULT_HTTP_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_RECEIPT_TIMEOUT,
};
use crate::contract::binding::{ContractKind, ContractRegistry};
use crate::contract::call::{call_view, DecodedResult};
use crate::contract::receipt::{await_receipt, PollOptions, Receipt};
use crate::contract::submit::{submit, TransactionHandle};
use crate::domain::{self, Listing, ListingKind, Product, SupplyChainEvent, Verification};
use crate::error::ChainError;
use crate::events::{self, BlockRange, DomainEvent};
use crate::node::{HttpNode, ThorNode};
use crate::signer::Signer;
use crate::Result;

/// Client for the TraceMarket contracts.
pub struct ChainClient {
    node: Arc<dyn ThorNode>,
    signer: Arc<dyn Signer>,
    registry: ContractRegistry,
    config: ChainConfig,
}

impl ChainClient {
    /// Builds the HTTP node from `config`, verifies the node answers, and
    /// returns a ready client.
    pub async fn connect(config: ChainConfig, signer: Arc<dyn Signer>) -> Result<ChainClient> {
        let timeout = config.http_timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT);
        let node = HttpNode::new(&config.node_url, timeout)?;
        let client = ChainClient::with_node(config, Arc::new(node), signer)?;
        let best = client.node.best_block().await?;
        info!(block = best.number, "connected to Thor node");
        Ok(client)
    }

    /// Assembles a client around an existing node handle. Tests and custom
    /// transports inject their own [`ThorNode`] here.
    pub fn with_node(
        config: ChainConfig,
        node: Arc<dyn ThorNode>,
        signer: Arc<dyn Signer>,
    ) -> Result<ChainClient> {
        config.validate()?;
        Ok(ChainClient {
            node,
            signer,
            registry: ContractRegistry::new(),
            config,
        })
    }

    /// Address the connected signer acts for.
    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    /// Drops cached contract bindings, e.g. after swapping node endpoints.
    pub async fn reset_bindings(&self) {
        self.registry.clear().await;
    }

    // --- products ---

    /// Product record by token id.
    #[instrument(skip(self))]
    pub async fn get_product(&self, token_id: u64) -> Result<Product> {
        let binding = self
            .registry
            .binding(ContractKind::Product, &self.config.contracts)
            .await?;
        let result = call_view(
            self.node.as_ref(),
            &binding,
            "getProduct",
            &[Token::Uint(U256::from(token_id))],
        )
        .await?;
        domain::format_product(&result.into_tokens())
    }

    /// Number of products minted so far.
    pub async fn total_products(&self) -> Result<u64> {
        let binding = self
            .registry
            .binding(ContractKind::Product, &self.config.contracts)
            .await?;
        let result = call_view(self.node.as_ref(), &binding, "totalProducts", &[]).await?;
        let value = scalar_uint(&result, "totalProducts output")?;
        if value > U256::from(u64::MAX) {
            return Err(ChainError::DecodeError {
                context: "totalProducts output".into(),
                reason: format!("value {value} exceeds u64 range"),
            });
        }
        Ok(value.as_u64())
    }

    /// Registers a new product; returns as soon as the wallet broadcast it.
    #[instrument(skip(self, metadata_uri))]
    pub async fn create_product(
        &self,
        name: &str,
        metadata_uri: &str,
        price_vet: &str,
    ) -> Result<TransactionHandle> {
        let price = self.parse_amount(ContractKind::Product, "createProduct", price_vet)?;
        let binding = self
            .registry
            .binding(ContractKind::Product, &self.config.contracts)
            .await?;
        submit(
            &binding,
            "createProduct",
            &[
                Token::String(name.to_string()),
                Token::String(metadata_uri.to_string()),
                Token::Uint(price),
            ],
            self.signer.as_ref(),
            U256::zero(),
        )
        .await
    }

    // --- marketplace ---

    /// Marketplace listing for a product.
    #[instrument(skip(self))]
    pub async fn get_listing(&self, token_id: u64) -> Result<Listing> {
        let binding = self
            .registry
            .binding(ContractKind::Marketplace, &self.config.contracts)
            .await?;
        let result = call_view(
            self.node.as_ref(),
            &binding,
            "getListing",
            &[Token::Uint(U256::from(token_id))],
        )
        .await?;
        domain::format_listing(&result.into_tokens())
    }

    /// Puts a product up for sale. `auction_end` only applies to auctions;
    /// `None` is recorded as no deadline.
    #[instrument(skip(self))]
    pub async fn list_product(
        &self,
        token_id: u64,
        price_vet: &str,
        kind: ListingKind,
        auction_end: Option<DateTime<Utc>>,
    ) -> Result<TransactionHandle> {
        let price = self.parse_amount(ContractKind::Marketplace, "listProduct", price_vet)?;
        let binding = self
            .registry
            .binding(ContractKind::Marketplace, &self.config.contracts)
            .await?;
        let deadline = match auction_end {
            None => U256::zero(),
            Some(end) => {
                let secs =
                    u64::try_from(end.timestamp()).map_err(|_| ChainError::ArgumentError {
                        contract: binding.address(),
                        method: "listProduct".into(),
                        reason: "auction end predates the unix epoch".into(),
                    })?;
                U256::from(secs)
            }
        };
        submit(
            &binding,
            "listProduct",
            &[
                Token::Uint(U256::from(token_id)),
                Token::Uint(price),
                Token::Uint(U256::from(kind.as_u8())),
                Token::Uint(deadline),
            ],
            self.signer.as_ref(),
            U256::zero(),
        )
        .await
    }

    /// Buys a listed product, paying `price_vet` in native VET.
    #[instrument(skip(self))]
    pub async fn buy_product(&self, token_id: u64, price_vet: &str) -> Result<TransactionHandle> {
        let value = self.parse_amount(ContractKind::Marketplace, "buyProduct", price_vet)?;
        let binding = self
            .registry
            .binding(ContractKind::Marketplace, &self.config.contracts)
            .await?;
        submit(
            &binding,
            "buyProduct",
            &[Token::Uint(U256::from(token_id))],
            self.signer.as_ref(),
            value,
        )
        .await
    }

    // --- supply chain ---

    /// Recorded checkpoints for a product, oldest first.
    #[instrument(skip(self))]
    pub async fn get_history(&self, token_id: u64) -> Result<Vec<SupplyChainEvent>> {
        let binding = self
            .registry
            .binding(ContractKind::SupplyChain, &self.config.contracts)
            .await?;
        let result = call_view(
            self.node.as_ref(),
            &binding,
            "getHistory",
            &[Token::Uint(U256::from(token_id))],
        )
        .await?;
        let raw = result.as_scalar().ok_or_else(|| ChainError::DecodeError {
            context: "supply-chain history".into(),
            reason: "expected a single array output".into(),
        })?;
        domain::format_checkpoints(raw)
    }

    /// Appends a checkpoint to a product's journey.
    #[instrument(skip(self))]
    pub async fn record_checkpoint(
        &self,
        token_id: u64,
        stage: &str,
        location: &str,
    ) -> Result<TransactionHandle> {
        let binding = self
            .registry
            .binding(ContractKind::SupplyChain, &self.config.contracts)
            .await?;
        submit(
            &binding,
            "recordCheckpoint",
            &[
                Token::Uint(U256::from(token_id)),
                Token::String(stage.to_string()),
                Token::String(location.to_string()),
            ],
            self.signer.as_ref(),
            U256::zero(),
        )
        .await
    }

    /// Current third-party verification status for a product.
    #[instrument(skip(self))]
    pub async fn get_verification(&self, token_id: u64) -> Result<Verification> {
        let binding = self
            .registry
            .binding(ContractKind::SupplyChain, &self.config.contracts)
            .await?;
        let result = call_view(
            self.node.as_ref(),
            &binding,
            "getVerification",
            &[Token::Uint(U256::from(token_id))],
        )
        .await?;
        domain::format_verification(&result.into_tokens())
    }

    // --- rewards ---

    /// Registers a submission for the configured reward and waits for the
    /// outcome.
    ///
    /// `Ok(false)` means the transaction was mined but reverted: the
    /// contract declined the registration. That is an answer, not a failure
    /// of this layer.
    #[instrument(skip(self))]
    pub async fn register_submission(&self, participant: Address) -> Result<bool> {
        let amount = domain::parse_vet(&self.config.reward_amount)?;
        let binding = self
            .registry
            .binding(ContractKind::Rewards, &self.config.contracts)
            .await?;
        let handle = submit(
            &binding,
            "registerSubmission",
            &[Token::Address(participant), Token::Uint(amount)],
            self.signer.as_ref(),
            U256::zero(),
        )
        .await?;
        let receipt = self.wait(&handle).await?;
        if receipt.reverted {
            info!(tx_id = ?handle.tx_id, "submission registration reverted");
        }
        Ok(!receipt.reverted)
    }

    /// Accumulated reward balance of a participant, in decimal VET.
    pub async fn reward_balance(&self, participant: Address) -> Result<String> {
        let binding = self
            .registry
            .binding(ContractKind::Rewards, &self.config.contracts)
            .await?;
        let result = call_view(
            self.node.as_ref(),
            &binding,
            "rewardBalance",
            &[Token::Address(participant)],
        )
        .await?;
        let value = scalar_uint(&result, "rewardBalance output")?;
        Ok(domain::format_vet(value))
    }

    // --- receipts and events ---

    /// Waits for a handle's receipt with the configured poll tuning.
    pub async fn wait(&self, handle: &TransactionHandle) -> Result<Receipt> {
        self.wait_with(handle, &CancelToken::never()).await
    }

    /// Like [`ChainClient::wait`], racing the poll against `cancel`.
    pub async fn wait_with(
        &self,
        handle: &TransactionHandle,
        cancel: &CancelToken,
    ) -> Result<Receipt> {
        let opts = PollOptions::default()
            .with_interval(self.config.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL))
            .with_timeout(self.config.receipt_timeout.unwrap_or(DEFAULT_RECEIPT_TIMEOUT));
        await_receipt(self.node.as_ref(), handle.tx_id, &opts, cancel).await
    }

    /// Historical events of `name` over `range`, oldest first.
    pub async fn fetch_events(&self, name: &str, range: BlockRange) -> Result<Vec<DomainEvent>> {
        events::fetch_events(
            self.node.as_ref(),
            &self.registry,
            &self.config.contracts,
            name,
            range,
        )
        .await
    }

    /// Supported domain events carried by a receipt, in clause order.
    pub async fn decode_receipt_events(&self, receipt: &Receipt) -> Result<Vec<DomainEvent>> {
        events::decode_receipt_events(&self.registry, &self.config.contracts, receipt).await
    }

    fn parse_amount(&self, kind: ContractKind, method: &str, amount: &str) -> Result<U256> {
        domain::parse_vet(amount).map_err(|_| ChainError::ArgumentError {
            contract: kind.address(&self.config.contracts),
            method: method.to_string(),
            reason: format!("invalid VET amount {amount:?}"),
        })
    }
}

fn scalar_uint(result: &DecodedResult, context: &str) -> Result<U256> {
    match result.as_scalar() {
        Some(Token::Uint(value)) => Ok(*value),
        other => Err(ChainError::DecodeError {
            context: context.to_string(),
            reason: format!("expected a single uint output, got {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContractAddresses;
    use crate::contract::receipt::testing::receipt_payload;
    use crate::domain::parse_vet;
    use crate::node::testing::MockNode;
    use crate::node::wire::{self, CallOutcome};
    use crate::signer::testing::MockSigner;
    use ethers::abi::encode;
    use ethers::types::H256;
    use std::time::Duration;

    fn test_contracts() -> ContractAddresses {
        ContractAddresses {
            product: Address::from_low_u64_be(1),
            marketplace: Address::from_low_u64_be(2),
            supply_chain: Address::from_low_u64_be(3),
            rewards: Address::from_low_u64_be(4),
        }
    }

    fn test_config() -> ChainConfig {
        let mut config = ChainConfig::solo(test_contracts());
        config.poll_interval = Some(Duration::from_millis(5));
        config.receipt_timeout = Some(Duration::from_millis(200));
        config
    }

    fn test_client() -> (ChainClient, Arc<MockNode>, Arc<MockSigner>) {
        let node = Arc::new(MockNode::new());
        let signer = Arc::new(MockSigner::new());
        let client = ChainClient::with_node(test_config(), node.clone(), signer.clone()).unwrap();
        (client, node, signer)
    }

    fn ok_outcome(tokens: &[Token]) -> CallOutcome {
        CallOutcome {
            data: wire::to_hex(&encode(tokens)),
            reverted: false,
            vm_error: String::new(),
            gas_used: 1000,
        }
    }

    #[test]
    fn with_node_validates_the_config() {
        let mut config = test_config();
        config.contracts.rewards = Address::zero();
        let result = ChainClient::with_node(
            config,
            Arc::new(MockNode::new()),
            Arc::new(MockSigner::new()),
        );
        assert!(matches!(result, Err(ChainError::Configuration(_))));
    }

    #[tokio::test]
    async fn get_product_returns_display_ready_values() {
        let (client, node, _) = test_client();
        node.push_call_outcome(Ok(vec![ok_outcome(&[
            Token::Uint(U256::from(7u64)),
            Token::String("Single-Origin Coffee".into()),
            Token::Address(Address::from_low_u64_be(0xaa)),
            Token::Uint(parse_vet("1.5").unwrap()),
            Token::Uint(U256::from(1_700_000_000u64)),
            Token::String("ipfs://QmProduct7".into()),
        ])]));

        let product = client.get_product(7).await.unwrap();
        assert_eq!(product.token_id, 7);
        assert_eq!(product.price, "1.5");
        assert_eq!(
            product.created_at,
            DateTime::from_timestamp(1_700_000_000, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn total_products_unwraps_the_scalar() {
        let (client, node, _) = test_client();
        node.push_call_outcome(Ok(vec![ok_outcome(&[Token::Uint(U256::from(12u64))])]));
        assert_eq!(client.total_products().await.unwrap(), 12);
    }

    #[tokio::test]
    async fn create_product_submits_through_the_signer() {
        let (client, _, signer) = test_client();

        let handle = client
            .create_product("Coffee", "ipfs://QmProduct7", "1.5")
            .await
            .unwrap();
        assert_eq!(handle.tx_id, H256::from_low_u64_be(0xdead));

        let requests = signer.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let clause = &requests[0].clauses[0];
        assert_eq!(clause.to, test_contracts().product);
        assert!(clause.value.is_zero());
        assert!(requests[0]
            .comment
            .as_deref()
            .unwrap()
            .starts_with("createProduct("));
    }

    #[tokio::test]
    async fn create_product_rejects_invalid_price() {
        let (client, _, signer) = test_client();
        let result = client.create_product("Coffee", "ipfs://x", "not-a-number").await;
        assert!(matches!(result, Err(ChainError::ArgumentError { .. })));
        assert_eq!(signer.request_count(), 0);
    }

    #[tokio::test]
    async fn buy_product_carries_the_price_as_value() {
        let (client, _, signer) = test_client();

        client.buy_product(7, "2").await.unwrap();

        let requests = signer.requests.lock().unwrap();
        let clause = &requests[0].clauses[0];
        assert_eq!(clause.to, test_contracts().marketplace);
        assert_eq!(clause.value, parse_vet("2").unwrap());
    }

    #[tokio::test]
    async fn list_product_encodes_deadline_and_kind() {
        let (client, _, signer) = test_client();
        let end = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        client
            .list_product(5, "2", ListingKind::Auction, Some(end))
            .await
            .unwrap();

        let registry = ContractRegistry::new();
        let binding = registry
            .binding(ContractKind::Marketplace, &test_contracts())
            .await
            .unwrap();
        let expected = binding
            .method("listProduct")
            .unwrap()
            .encode_input(&[
                Token::Uint(U256::from(5u64)),
                Token::Uint(parse_vet("2").unwrap()),
                Token::Uint(U256::one()),
                Token::Uint(U256::from(1_700_000_000u64)),
            ])
            .unwrap();

        let requests = signer.requests.lock().unwrap();
        assert_eq!(requests[0].clauses[0].data, expected);
    }

    #[tokio::test]
    async fn get_listing_translates_the_zero_sentinel() {
        let (client, node, _) = test_client();
        node.push_call_outcome(Ok(vec![ok_outcome(&[
            Token::Uint(U256::from(5u64)),
            Token::Address(Address::from_low_u64_be(0xbb)),
            Token::Uint(parse_vet("2").unwrap()),
            Token::Uint(U256::zero()),
            Token::Uint(U256::zero()),
            Token::Bool(true),
        ])]));

        let listing = client.get_listing(5).await.unwrap();
        assert_eq!(listing.kind, ListingKind::FixedPrice);
        assert_eq!(listing.auction_end, None);
        assert_eq!(listing.price, "2");
    }

    #[tokio::test]
    async fn get_history_maps_checkpoint_tuples() {
        let (client, node, _) = test_client();
        node.push_call_outcome(Ok(vec![ok_outcome(&[Token::Array(vec![
            Token::Tuple(vec![
                Token::Uint(U256::from(7u64)),
                Token::String("Harvested".into()),
                Token::String("Huila, Colombia".into()),
                Token::Address(Address::from_low_u64_be(0xcc)),
                Token::Uint(U256::from(1_699_990_000u64)),
            ]),
            Token::Tuple(vec![
                Token::Uint(U256::from(7u64)),
                Token::String("Shipped".into()),
                Token::String("Cartagena".into()),
                Token::Address(Address::from_low_u64_be(0xdd)),
                Token::Uint(U256::from(1_700_000_000u64)),
            ]),
        ])])]));

        let history = client.get_history(7).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].stage, "Harvested");
        assert_eq!(history[1].location, "Cartagena");
    }

    #[tokio::test]
    async fn get_verification_reads_the_absence_sentinel() {
        let (client, node, _) = test_client();
        node.push_call_outcome(Ok(vec![ok_outcome(&[
            Token::Address(Address::zero()),
            Token::String(String::new()),
            Token::Uint(U256::zero()),
            Token::Bool(false),
        ])]));

        let verification = client.get_verification(7).await.unwrap();
        assert_eq!(verification.verified_at, None);
        assert!(!verification.valid);
    }

    #[tokio::test]
    async fn register_submission_reports_reverted_as_false() {
        let (client, node, signer) = test_client();
        node.push_receipt(Ok(Some(receipt_payload(true))));

        let accepted = client
            .register_submission(Address::from_low_u64_be(0x55))
            .await
            .unwrap();

        assert!(!accepted);
        assert_eq!(signer.request_count(), 1);
    }

    #[tokio::test]
    async fn register_submission_reports_mined_as_true() {
        let (client, node, _) = test_client();
        node.push_receipt(Ok(Some(receipt_payload(false))));

        let accepted = client
            .register_submission(Address::from_low_u64_be(0x55))
            .await
            .unwrap();
        assert!(accepted);
    }

    #[tokio::test]
    async fn reward_balance_formats_decimal_vet() {
        let (client, node, _) = test_client();
        node.push_call_outcome(Ok(vec![ok_outcome(&[Token::Uint(
            parse_vet("3.25").unwrap(),
        )])]));

        let balance = client
            .reward_balance(Address::from_low_u64_be(0x55))
            .await
            .unwrap();
        assert_eq!(balance, "3.25");
    }

    #[tokio::test]
    async fn wait_honours_the_configured_timeout() {
        let (client, _, _) = test_client();
        let handle = TransactionHandle {
            tx_id: H256::from_low_u64_be(0x42),
        };

        let result = client.wait(&handle).await;
        assert!(matches!(result, Err(ChainError::TransactionTimeout { .. })));
    }

    #[tokio::test]
    async fn fetch_events_goes_through_the_shared_table() {
        let (client, node, _) = test_client();
        let result = client.fetch_events("Teleported", BlockRange::all()).await;
        assert!(matches!(result, Err(ChainError::UnknownEvent { .. })));
        assert!(node.log_queries.lock().unwrap().is_empty());
    }
}
