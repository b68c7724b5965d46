use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::ScrapeError;
use crate::models::Category;

/// Markup parser identifiers accepted in `web.parser`. All of them are served
/// by the html5ever parser behind `scraper`.
pub const KNOWN_PARSERS: [&str; 3] = ["lxml", "html.parser", "html5lib"];

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub web: WebConfig,
    pub retry: RetryConfig,
    pub output: OutputConfig,
}

/// Target sites and the requested slice of the ranking
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    pub user_agent: String,
    pub parser: String,
    pub companies_url: String,
    pub ticker_url: String,
    pub page_param: String,
    pub companies_by: Vec<Category>,
    pub output_filename: String,
    pub max_companies: u32,
    pub start_from: i64,
    pub timeout_secs: u64,
}

/// Backoff policy for listing-page fetches
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retry until the server answers, ignoring every cap below.
    pub unbounded: bool,
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// The n-th retry waits `2^n * backoff_factor_ms`.
    pub backoff_factor_ms: u64,
    pub max_delay_ms: u64,
    pub max_total_wait_ms: u64,
}

/// Where files land
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub merged_file: String,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
                         Chrome/120.0 Safari/537.36"
                .to_string(),
            parser: "lxml".to_string(),
            companies_url: "https://companiesmarketcap.com/".to_string(),
            ticker_url: "https://finance.yahoo.com/quote/".to_string(),
            page_param: "page/".to_string(),
            companies_by: vec![
                Category::new("marketcap", ""),
                Category::new("revenue", "largest-companies-by-revenue/"),
            ],
            output_filename: "_companies_".to_string(),
            max_companies: 100,
            start_from: 1,
            timeout_secs: 30,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            unbounded: false,
            max_attempts: 8,
            backoff_factor_ms: 250,
            max_delay_ms: 30_000,
            max_total_wait_ms: 300_000,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            merged_file: "clean.csv".to_string(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides, then validate.
    /// `.env` must already be applied to the process environment.
    pub fn load() -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("SCRAPER").separator("__"));

        Self::from_builder(builder)
    }

    /// Parse a TOML document on top of the defaults.
    pub fn from_toml(toml: &str) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml));
        Self::from_builder(builder)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let app_cfg: AppConfig = builder
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app_cfg.validate()?;
        Ok(app_cfg)
    }

    /// Shape checks run once, before any component is built.
    pub fn validate(&self) -> Result<(), ScrapeError> {
        let web = &self.web;

        if web.user_agent.trim().is_empty() {
            return Err(ScrapeError::Config("web.user_agent is empty".into()));
        }
        if !KNOWN_PARSERS.contains(&web.parser.as_str()) {
            return Err(ScrapeError::Config(format!(
                "web.parser {:?} is not one of {:?}",
                web.parser, KNOWN_PARSERS
            )));
        }
        for (key, value) in [
            ("web.companies_url", &web.companies_url),
            ("web.ticker_url", &web.ticker_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| ScrapeError::Config(format!("{key} {value:?}: {e}")))?;
        }
        if web.companies_by.is_empty() {
            return Err(ScrapeError::Config("web.companies_by is empty".into()));
        }

        let mut seen = HashSet::new();
        for category in &web.companies_by {
            if category.by.trim().is_empty() {
                return Err(ScrapeError::Config("category with empty `by`".into()));
            }
            if !seen.insert(category.by.as_str()) {
                return Err(ScrapeError::Config(format!(
                    "category `by` {:?} listed twice",
                    category.by
                )));
            }
        }

        if !self.retry.unbounded && self.retry.max_attempts == 0 {
            return Err(ScrapeError::Config(
                "retry.max_attempts must be at least 1 unless retry.unbounded".into(),
            ));
        }
        if self.output.merged_file.trim().is_empty() {
            return Err(ScrapeError::Config("output.merged_file is empty".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.web.companies_by[0].by, "marketcap");
        assert_eq!(cfg.output.merged_file, "clean.csv");
    }

    #[test]
    fn toml_overrides_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [web]
            max_companies = 250
            start_from = 101

            [[web.companies_by]]
            by = "earnings"
            category = "most-profitable-companies/"

            [retry]
            unbounded = true
            "#,
        )
        .unwrap();

        assert_eq!(cfg.web.max_companies, 250);
        assert_eq!(cfg.web.start_from, 101);
        assert_eq!(cfg.web.companies_by.len(), 1);
        assert_eq!(cfg.web.companies_by[0].category, "most-profitable-companies/");
        assert!(cfg.retry.unbounded);
        assert_eq!(cfg.web.page_param, "page/");
    }

    #[test]
    fn rejects_bad_urls_and_duplicates() {
        let mut cfg = AppConfig::default();
        cfg.web.ticker_url = "not a url".into();
        assert!(matches!(cfg.validate(), Err(ScrapeError::Config(_))));

        let mut cfg = AppConfig::default();
        cfg.web.companies_by = vec![Category::new("revenue", "a/"), Category::new("revenue", "b/")];
        assert!(matches!(cfg.validate(), Err(ScrapeError::Config(_))));
    }

    #[test]
    fn rejects_unknown_parser_and_zero_attempts() {
        let mut cfg = AppConfig::default();
        cfg.web.parser = "regex".into();
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.retry.max_attempts = 0;
        assert!(cfg.validate().is_err());
        cfg.retry.unbounded = true;
        assert!(cfg.validate().is_ok());
    }
}
