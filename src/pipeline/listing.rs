use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::info;

use super::pagination::listing_pages;
use super::{extract_page, ranking_url};
use crate::config::{AppConfig, WebConfig};
use crate::models::{Category, ListingRecord, ListingTable};
use crate::scraper::cleaner::listing_record;
use crate::scraper::{FieldExtractor, PageFetcher, Profile, RetryPolicy, fetch_with_retry};
use crate::storage::{listing_file_name, write_listing_table};

#[derive(Debug)]
pub struct ListingOutcome {
    pub by: String,
    pub path: PathBuf,
    pub pages: usize,
    pub rows: usize,
    /// False when the page range was empty and nothing was written.
    pub written: bool,
}

pub struct ListingScraper<F, E> {
    web: WebConfig,
    output_dir: PathBuf,
    policy: RetryPolicy,
    fetcher: F,
    extractor: E,
}

impl<F: PageFetcher, E: FieldExtractor> ListingScraper<F, E> {
    pub fn new(config: &AppConfig, fetcher: F, extractor: E) -> Self {
        Self {
            web: config.web.clone(),
            output_dir: config.output.dir.clone(),
            policy: RetryPolicy::from_config(&config.retry),
            fetcher,
            extractor,
        }
    }

    fn page_url(&self, category: &Category, page: i64) -> String {
        ranking_url(
            &self.web.companies_url,
            &category.category,
            &self.web.page_param,
            page,
        )
    }

    /// Scrape every configured category in order.
    pub async fn run(&self, date: NaiveDate) -> Result<Vec<ListingOutcome>> {
        let mut outcomes = Vec::with_capacity(self.web.companies_by.len());
        for category in &self.web.companies_by {
            let outcome = self
                .scrape_category(category, date)
                .await
                .with_context(|| format!("Listing scrape for {:?} failed", category.by))?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    pub async fn scrape_category(&self, category: &Category, date: NaiveDate) -> Result<ListingOutcome> {
        let start = self.web.start_from;
        let count = self.web.max_companies;
        let end_index = start + i64::from(count) - 1;
        let path = self.output_dir.join(listing_file_name(
            end_index,
            &category.by,
            &self.web.output_filename,
            date,
        ));

        let pages = listing_pages(start, count);
        info!(
            "=== {}: pages {}..={} → {:?} ===",
            category.by,
            pages.start(),
            pages.end(),
            path
        );

        let mut table = ListingTable::new();
        let mut fetched = 0usize;
        for page in pages {
            let url = self.page_url(category, page);
            let body = fetch_with_retry(&self.fetcher, &url, &self.policy).await?;

            let rows = self
                .parse_page(&body)
                .with_context(|| format!("Failed to extract page {} ({})", page, url))?;
            info!("  Page {:02}: {} rows", page, rows.len());
            table.extend(rows);
            fetched += 1;

            write_listing_table(&path, &category.by, &table)?;
        }

        Ok(ListingOutcome {
            by: category.by.clone(),
            path,
            pages: fetched,
            rows: table.len(),
            written: fetched > 0,
        })
    }

    fn parse_page(&self, body: &str) -> Result<Vec<ListingRecord>> {
        let raw = extract_page(&self.extractor, Profile::Listing, body, &self.web.parser)?;
        let rows = raw
            .iter()
            .map(listing_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
