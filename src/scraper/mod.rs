pub mod cleaner;
pub mod http_client;
pub mod parsers;

use async_trait::async_trait;

use crate::error::ScrapeError;

pub use self::http_client::{HttpClient, RetryPolicy, fetch_with_retry};
pub use self::parsers::{FieldExtractor, MarkupExtractor, Profile};

// ── Fetch trait ───────────────────────────────────────────────────────────────

/// One GET, one answer. Non-success statuses come back as
/// [`ScrapeError::Status`]; retrying is the caller's decision.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError>;
}

// ── Test doubles ──────────────────────────────────────────────────────────────

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Serves queued responses per URL; an exhausted queue answers 404.
    #[derive(Default)]
    pub struct StubFetcher {
        responses: Mutex<HashMap<String, VecDeque<Result<String, u16>>>>,
        requests: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn serve(&self, url: &str, body: impl Into<String>) {
            self.push(url, Ok(body.into()));
        }

        pub fn fail(&self, url: &str, status: u16) {
            self.push(url, Err(status));
        }

        fn push(&self, url: &str, response: Result<String, u16>) {
            self.responses
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push_back(response);
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
            self.requests.lock().unwrap().push(url.to_string());
            let next = self
                .responses
                .lock()
                .unwrap()
                .get_mut(url)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Err(404));
            next.map_err(|status| ScrapeError::Status {
                url: url.to_string(),
                status,
            })
        }
    }

    /// One ranking row laid out like companiesmarketcap.com.
    pub fn listing_row(
        company: &str,
        code: &str,
        by_value: &str,
        price: &str,
        change: &str,
        country: &str,
    ) -> String {
        format!(
            r#"<tr>
                <td class="rank-td td-right"><span class="rank">1</span></td>
                <td class="name-td"><div class="company-name">
{company}
</div><div class="company-code">{code}</div></td>
                <td class="td-right">{by_value}</td>
                <td class="td-right">{price}</td>
                <td class="rh-sm"><span class="percentage-green">{change}</span></td>
                <td><img class="flag"><span class="responsive-hidden">{country}</span></td>
            </tr>"#
        )
    }

    pub fn listing_page(rows: &[String]) -> String {
        format!(
            "<html><body><table><thead><tr><th>Rank</th></tr></thead><tbody>{}</tbody></table></body></html>",
            rows.concat()
        )
    }

    pub fn detail_page(
        heading: &str,
        price: &str,
        previous: &str,
        volume: &str,
        market_cap: Option<&str>,
    ) -> String {
        let cap = market_cap
            .map(|c| format!(r#"<tr><td>Market Cap</td><td data-test="MARKET_CAP-value">{c}</td></tr>"#))
            .unwrap_or_default();
        format!(
            r#"<html><body>
            <h1>{heading}</h1>
            <fin-streamer data-field="regularMarketPrice">{price}</fin-streamer>
            <table><tbody>
                <tr><td>Previous Close</td><td data-test="PREV_CLOSE-value">{previous}</td></tr>
                <tr><td>Volume</td><td data-test="TD_VOLUME-value">{volume}</td></tr>
                <tr><td>PE Ratio</td><td data-test="PE_RATIO-value">24.61</td></tr>
                <tr><td>EPS</td><td data-test="EPS_RATIO-value">6.11</td></tr>
                {cap}
            </tbody></table>
            </body></html>"#
        )
    }
}
