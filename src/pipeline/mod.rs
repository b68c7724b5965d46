//! Scrape drivers: tie fetcher → extractor → coercer → CSV together.
//!
//! ## Run modes
//!
//! `ListingScraper`: one ranking table per configured category. The whole
//!   table so far is rewritten after every page, so an interrupted run leaves
//!   the last complete page's data on disk.
//!
//! `DetailScraper`: harvests symbols from the ranking pages, then visits each
//!   ticker's quote page once. The batch is written in one go at the end and
//!   read back for a sanity log.
//!
//! Both fetch ranking pages through the retry policy; quote pages are never
//! retried.

pub mod detail;
pub mod listing;
pub mod pagination;

pub use self::detail::DetailScraper;
pub use self::listing::ListingScraper;

use crate::error::ScrapeError;
use crate::models::RawFields;
use crate::scraper::parsers::parse_document;
use crate::scraper::{FieldExtractor, Profile};

/// Parse `body` and run one extraction profile over it. The parsed document
/// never outlives this call.
pub(crate) fn extract_page<E: FieldExtractor>(
    extractor: &E,
    profile: Profile,
    body: &str,
    parser: &str,
) -> Result<Vec<RawFields>, ScrapeError> {
    let doc = parse_document(body, parser);
    extractor.extract(profile, &doc)
}

/// `companies_url + category + page_param + page + "/"`
pub(crate) fn ranking_url(base: &str, category: &str, page_param: &str, page: i64) -> String {
    format!("{base}{category}{page_param}{page}/")
}
