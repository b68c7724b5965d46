use async_trait::async_trait;
use std::time::Duration;
use tokio_retry::Retry;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{debug, warn};

use super::PageFetcher;
use crate::config::{RetryConfig, WebConfig};
use crate::error::ScrapeError;

// ── Transport ─────────────────────────────────────────────────────────────────

pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: &WebConfig) -> Result<Self, ScrapeError> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| ScrapeError::Network {
                url: "(client setup)".to_string(),
                source,
            })?;

        Ok(Self { inner })
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        debug!("GET {}", url);

        let network = |source: reqwest::Error| ScrapeError::Network {
            url: url.to_string(),
            source,
        };

        let resp = self.inner.get(url).send().await.map_err(network)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.text().await.map_err(network)
    }
}

// ── Retry policy ──────────────────────────────────────────────────────────────

/// Delays between listing-page attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    unbounded: bool,
    max_attempts: u32,
    backoff_factor: Duration,
    max_delay: Duration,
    max_total_wait: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            unbounded: config.unbounded,
            max_attempts: config.max_attempts,
            backoff_factor: Duration::from_millis(config.backoff_factor_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_total_wait: Duration::from_millis(config.max_total_wait_ms),
        }
    }

    /// Sleep schedule between attempts. One element per retry, so a bounded
    /// policy yields at most `max_attempts - 1` delays.
    pub fn delays(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        let factor = u64::try_from(self.backoff_factor.as_millis()).unwrap_or(u64::MAX);
        let backoff = ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_delay);

        if self.unbounded {
            return Box::new(backoff);
        }

        let cap = self.max_total_wait;
        let retries = self.max_attempts.saturating_sub(1) as usize;
        Box::new(
            backoff
                .take(retries)
                .scan(Duration::ZERO, move |waited, delay| {
                    *waited = waited.saturating_add(delay);
                    (*waited <= cap).then_some(delay)
                }),
        )
    }
}

/// Fetch through the policy. Exhaustion is reported with the attempt count
/// and the last underlying failure.
pub async fn fetch_with_retry<F>(
    fetcher: &F,
    url: &str,
    policy: &RetryPolicy,
) -> Result<String, ScrapeError>
where
    F: PageFetcher + ?Sized,
{
    let mut attempts = 0u32;
    let result = Retry::start(policy.delays(), || {
        attempts += 1;
        let attempt = attempts;
        async move {
            fetcher.fetch(url).await.inspect_err(|e| {
                warn!("attempt {} for {} was not accepted: {}", attempt, url, e);
            })
        }
    })
    .await;

    result.map_err(|last| ScrapeError::FetchExhausted {
        url: url.to_string(),
        attempts,
        last: Box::new(last),
    })
}
