use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::{debug, info};

use super::pagination::detail_pages;
use super::{extract_page, ranking_url};
use crate::config::{AppConfig, WebConfig};
use crate::models::{DetailRow, Field};
use crate::scraper::cleaner::detail_record;
use crate::scraper::{FieldExtractor, PageFetcher, Profile, RetryPolicy, fetch_with_retry};
use crate::storage::{VerifySummary, detail_file_name, verify_results, write_detail_batch};

#[derive(Debug)]
pub struct DetailOutcome {
    pub path: PathBuf,
    pub symbols: usize,
    pub sentinels: usize,
    pub summary: VerifySummary,
}

pub struct DetailScraper<F, E> {
    web: WebConfig,
    output_dir: PathBuf,
    policy: RetryPolicy,
    fetcher: F,
    extractor: E,
}

impl<F: PageFetcher, E: FieldExtractor> DetailScraper<F, E> {
    pub fn new(config: &AppConfig, fetcher: F, extractor: E) -> Self {
        Self {
            web: config.web.clone(),
            output_dir: config.output.dir.clone(),
            policy: RetryPolicy::from_config(&config.retry),
            fetcher,
            extractor,
        }
    }

    /// Ticker symbols ranked `start ..`, exactly `count` of them when the
    /// pages hold enough.
    pub async fn discover_symbols(&self, start: i64, count: u32) -> Result<Vec<String>> {
        let mut symbols = Vec::new();
        for page in detail_pages(start, count) {
            let url = ranking_url(&self.web.companies_url, "", &self.web.page_param, page);
            info!("Web page: {}", url);

            let body = fetch_with_retry(&self.fetcher, &url, &self.policy).await?;
            let found = extract_page(&self.extractor, Profile::Symbols, &body, &self.web.parser)
                .with_context(|| format!("Failed to read symbols from {}", url))?;
            symbols.extend(
                found
                    .iter()
                    .filter_map(|f| f.get(Field::Ticker))
                    .map(str::to_string),
            );
        }

        symbols.truncate(count as usize);
        Ok(symbols)
    }

    /// One quote page, one attempt. `None` when the page is unavailable or
    /// has no heading; coercion failures (volume) are errors.
    pub async fn scrape_symbol(&self, symbol: &str) -> Result<DetailRow> {
        let url = format!("{}{}", self.web.ticker_url, symbol);
        let body = match self.fetcher.fetch(&url).await {
            Ok(body) => body,
            Err(e) => {
                info!("{}: {}", symbol, e);
                return Ok(None);
            }
        };

        let fields = extract_page(&self.extractor, Profile::Detail, &body, &self.web.parser)
            .with_context(|| format!("Failed to extract {}", url))?;
        let Some(fields) = fields.first() else {
            info!("{}: no heading on {}", symbol, url);
            return Ok(None);
        };

        let record = detail_record(symbol, fields)?;
        debug!("{}: {:?}", symbol, record);
        Ok(Some(record))
    }

    pub async fn run(&self, date: NaiveDate) -> Result<DetailOutcome> {
        let start = self.web.start_from;
        let count = self.web.max_companies;

        info!("Start processing stock symbols...");
        let symbols = self.discover_symbols(start, count).await?;

        let mut batch: Vec<DetailRow> = Vec::with_capacity(symbols.len());
        for (i, symbol) in symbols.iter().enumerate() {
            info!("Processing {} ({}/{})", symbol, i + 1, symbols.len());
            let row = self
                .scrape_symbol(symbol)
                .await
                .with_context(|| format!("Detail scrape for {} failed", symbol))?;
            batch.push(row);
        }
        info!("End processing stock symbols...");

        let end = start + i64::from(count) - 1;
        let path = self
            .output_dir
            .join(detail_file_name(start, end, &self.web.output_filename, date));
        write_detail_batch(&path, &batch)?;
        let summary = verify_results(&path)?;

        Ok(DetailOutcome {
            path,
            symbols: symbols.len(),
            sentinels: batch.iter().filter(|r| r.is_none()).count(),
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;
    use crate::scraper::MarkupExtractor;
    use crate::scraper::testing::{StubFetcher, detail_page, listing_page, listing_row};
    use crate::utils::scratch_dir;

    fn config(dir: &std::path::Path, count: u32) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.web.companies_url = "https://cmc.test/".into();
        cfg.web.ticker_url = "https://quote.test/".into();
        cfg.web.output_filename = "_stocks_".into();
        cfg.web.start_from = 1;
        cfg.web.max_companies = count;
        cfg.retry.max_attempts = 2;
        cfg.retry.backoff_factor_ms = 1;
        cfg.output.dir = dir.to_path_buf();
        cfg
    }

    fn ranking(codes: &[&str]) -> String {
        let rows: Vec<String> = codes
            .iter()
            .map(|c| listing_row(c, c, "1", "$1", "1%", "USA"))
            .collect();
        listing_page(&rows)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[tokio::test]
    async fn failed_and_headless_pages_become_sentinels() {
        let dir = scratch_dir("detail-sentinels");
        let stub = StubFetcher::new();
        stub.serve("https://cmc.test/page/1/", ranking(&["AAPL", "MSFT", "IDX", "NVDA"]));
        stub.serve(
            "https://quote.test/AAPL",
            detail_page("Apple Inc. (AAPL)", "150.25", "148.00", "52,164,520", Some("2,450,000")),
        );
        stub.fail("https://quote.test/MSFT", 503);
        stub.serve("https://quote.test/IDX", "<html><body>No heading</body></html>");

        let scraper = DetailScraper::new(&config(&dir, 3), stub, MarkupExtractor::new().unwrap());
        let outcome = scraper.run(date()).await.unwrap();

        assert_eq!(outcome.symbols, 3);
        assert_eq!(outcome.sentinels, 2);
        assert!(outcome.path.ends_with("1_to_3_stocks_2024-03-01.csv"));
        assert_eq!(outcome.summary.rows, 3);
        assert_eq!(outcome.summary.symbols, 1);

        let first = &outcome.summary.sample[0];
        assert_eq!(first[0], "Apple Inc.");
        assert_eq!(first[4], "2.25");
        assert_eq!(first[7], "52164520");
        assert_eq!(first[8], "2450000");
    }

    #[tokio::test]
    async fn quote_pages_are_not_retried() {
        let dir = scratch_dir("detail-no-retry");
        let stub = StubFetcher::new();
        stub.serve("https://cmc.test/page/1/", ranking(&["MSFT"]));

        let scraper = DetailScraper::new(&config(&dir, 1), stub, MarkupExtractor::new().unwrap());
        assert_eq!(scraper.scrape_symbol("MSFT").await.unwrap(), None);

        let quote_hits = scraper
            .fetcher
            .requests()
            .iter()
            .filter(|u| u.starts_with("https://quote.test/"))
            .count();
        assert_eq!(quote_hits, 1);
    }

    #[tokio::test]
    async fn discovery_spans_pages_and_truncates() {
        let dir = scratch_dir("detail-discovery");
        let stub = StubFetcher::new();
        let first: Vec<String> = (0..100).map(|i| format!("T{i:03}")).collect();
        let first: Vec<&str> = first.iter().map(String::as_str).collect();
        stub.serve("https://cmc.test/page/1/", ranking(&first));
        stub.serve("https://cmc.test/page/2/", ranking(&["NEXT1", "NEXT2"]));

        let scraper = DetailScraper::new(&config(&dir, 100), stub, MarkupExtractor::new().unwrap());
        let symbols = scraper.discover_symbols(1, 100).await.unwrap();

        assert_eq!(symbols.len(), 100);
        assert_eq!(symbols[99], "T099");
        assert_eq!(scraper.fetcher.requests().len(), 2);
    }

    #[test]
    fn bad_volume_aborts_the_run() {
        let dir = scratch_dir("detail-volume");
        let stub = StubFetcher::new();
        stub.serve("https://cmc.test/page/1/", ranking(&["AAPL"]));
        stub.serve(
            "https://quote.test/AAPL",
            detail_page("Apple Inc. (AAPL)", "150.25", "148.00", "N/A", None),
        );

        let scraper = DetailScraper::new(&config(&dir, 1), stub, MarkupExtractor::new().unwrap());
        let err = tokio_test::block_on(scraper.run(date())).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ScrapeError>(),
            Some(ScrapeError::InvalidVolume { .. })
        ));
        assert!(!dir.join("1_to_1_stocks_2024-03-01.csv").exists());
    }
}
