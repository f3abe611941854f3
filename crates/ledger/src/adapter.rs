//! External fetch adapter for liquidity provider inventory, bounded by the
//! retry/backoff policy in §5: only idempotent GETs, retried on
//! `408/425/429/5xx`, never on a non-retryable rejection.

use serde_json::Value;
use swapgraph_core::config::RetryConfig;
use tracing::{debug, warn};

use crate::error::LedgerError;

#[derive(Clone)]
pub struct LiquidityAdapterClient {
    http: reqwest::Client,
    retry: RetryConfig,
}

impl LiquidityAdapterClient {
    pub fn new(retry: RetryConfig) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            retry,
        }
    }

    /// Fetch a provider's inventory JSON, retrying transient failures with
    /// exponential backoff.
    pub async fn fetch_inventory(&self, url: &str) -> Result<Value, LedgerError> {
        let mut attempt = 0;
        loop {
            let outcome = self.http.get(url).send().await;
            match outcome {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if response.status().is_success() {
                        let body: Value = response
                            .json()
                            .await
                            .map_err(|e| LedgerError::AdapterExhausted(e.to_string()))?;
                        return Ok(body);
                    }
                    if !RetryConfig::is_retryable_status(status) || attempt >= self.retry.max_retries {
                        warn!(status, attempt, "liquidity inventory fetch rejected");
                        return Err(LedgerError::AdapterRejected(status));
                    }
                }
                Err(err) => {
                    if attempt >= self.retry.max_retries {
                        return Err(LedgerError::AdapterExhausted(err.to_string()));
                    }
                }
            }

            let delay = self.retry.delay_for_attempt(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying liquidity fetch");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
