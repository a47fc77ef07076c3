//! HTTP client for the Thor node REST API.

use std::time::{Duration, Instant};

use reqwest::{Client, Response, Url};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::wire::{BlockSummary, CallOutcome, CallRequest, LogPayload, LogQuery, ReceiptPayload};
use super::ThorNode;
use crate::error::ChainError;
use crate::Result;

use async_trait::async_trait;
use ethers::types::H256;

/// Maximum attempts for one logical request.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retries; doubles per attempt.
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Minimum interval between requests to the node.
const MIN_CALL_INTERVAL: Duration = Duration::from_millis(50);

/// [`ThorNode`] implementation over the node's REST API.
///
/// Transient failures (transport errors, 5xx) are retried with exponential
/// backoff; client errors are surfaced on the first attempt. Requests are
/// lightly rate-limited so bursts of view calls do not hammer public nodes.
pub struct HttpNode {
    client: Client,
    base_url: Url,
    last_call: Mutex<Option<Instant>>,
}

impl HttpNode {
    /// Builds a client for the node at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        // A trailing slash keeps Url::join from clobbering path prefixes.
        let mut normalized = base_url.trim_end_matches('/').to_string();
        normalized.push('/');
        let base_url = Url::parse(&normalized).map_err(|e| {
            ChainError::Configuration(format!("invalid node URL {base_url:?}: {e}"))
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(HttpNode {
            client,
            base_url,
            last_call: Mutex::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ChainError::Configuration(format!("invalid endpoint {path:?}: {e}")))
    }

    async fn enforce_rate_limit(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < MIN_CALL_INTERVAL {
                sleep(MIN_CALL_INTERVAL - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }

    /// Sends a request, retrying transient failures with backoff.
    async fn send_with_retry<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        self.enforce_rate_limit().await;

        let mut last_error = String::new();
        for attempt in 0..MAX_RETRY_ATTEMPTS {
            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let body = response.text().await.unwrap_or_default();
                    let reason = format!("node answered {status}: {body}");
                    // 4xx will not heal on retry.
                    if status.is_client_error() {
                        return Err(ChainError::NetworkUnavailable { reason });
                    }
                    warn!(attempt = attempt + 1, %status, "node request failed");
                    last_error = reason;
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "node request failed");
                    last_error = e.to_string();
                }
            }
            if attempt + 1 < MAX_RETRY_ATTEMPTS {
                sleep(Duration::from_millis(RETRY_BASE_DELAY_MS * 2u64.pow(attempt))).await;
            }
        }

        Err(ChainError::NetworkUnavailable {
            reason: format!("request failed after {MAX_RETRY_ATTEMPTS} attempts: {last_error}"),
        })
    }
}

#[async_trait]
impl ThorNode for HttpNode {
    async fn best_block(&self) -> Result<BlockSummary> {
        let url = self.endpoint("blocks/best")?;
        let response = self.send_with_retry(|| self.client.get(url.clone())).await?;
        Ok(response.json().await?)
    }

    async fn execute_call(&self, request: CallRequest) -> Result<Vec<CallOutcome>> {
        let url = self.endpoint("accounts/*")?;
        debug!(clauses = request.clauses.len(), "executing call");
        let response = self
            .send_with_retry(|| self.client.post(url.clone()).json(&request))
            .await?;
        Ok(response.json().await?)
    }

    async fn transaction_receipt(&self, tx_id: H256) -> Result<Option<ReceiptPayload>> {
        let path = format!("transactions/0x{}/receipt", hex::encode(tx_id.as_bytes()));
        let url = self.endpoint(&path)?;
        let response = self.send_with_retry(|| self.client.get(url.clone())).await?;
        // The node answers `null` while the transaction is pending.
        Ok(response.json().await?)
    }

    async fn event_logs(&self, query: LogQuery) -> Result<Vec<LogPayload>> {
        let url = self.endpoint("logs/event")?;
        let response = self
            .send_with_retry(|| self.client.post(url.clone()).json(&query))
            .await?;
        Ok(response.json().await?)
    }
}
