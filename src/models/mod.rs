use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ScrapeError;

// ── Category ──────────────────────────────────────────────────────────────────

/// A ranking dimension scraped into its own table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    /// Output column name; also tags the file name.
    pub by: String,
    /// URL path segment appended to the listing base URL ("" for market cap).
    #[serde(default)]
    pub category: String,
}

impl Category {
    pub fn new(by: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            by: by.into(),
            category: category.into(),
        }
    }
}

// ── Listing rows ──────────────────────────────────────────────────────────────

/// One row of a ranking page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListingRecord {
    pub company: String,
    pub ticker: String,
    pub by_value: String,
    pub price: String,
    pub daily_change: String,
    pub country: String,
}

impl ListingRecord {
    pub fn header(by: &str) -> [&str; 6] {
        ["company", "ticker", by, "price", "daily change", "country"]
    }

    pub fn to_row(&self) -> [&str; 6] {
        [
            &self.company,
            &self.ticker,
            &self.by_value,
            &self.price,
            &self.daily_change,
            &self.country,
        ]
    }
}

pub type ListingTable = Vec<ListingRecord>;

// ── Detail rows ───────────────────────────────────────────────────────────────

/// One ticker's detail page, coerced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetailRecord {
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Marketprice")]
    pub market_price: f64,
    #[serde(rename = "previousClosePrice")]
    pub previous_close: f64,
    #[serde(rename = "changeInPrice")]
    pub change_in_price: f64,
    #[serde(rename = "pe_ratio")]
    pub pe_ratio: f64,
    #[serde(rename = "eps_ratio")]
    pub eps_ratio: f64,
    #[serde(rename = "Volume")]
    pub volume: i64,
    #[serde(rename = "MarketCap")]
    pub market_cap: String,
}

impl DetailRecord {
    pub const COLUMNS: [&'static str; 9] = [
        "Company",
        "Symbol",
        "Marketprice",
        "previousClosePrice",
        "changeInPrice",
        "pe_ratio",
        "eps_ratio",
        "Volume",
        "MarketCap",
    ];
}

/// `None` is the sentinel for a symbol whose page could not be used.
pub type DetailRow = Option<DetailRecord>;

// ── Raw extracted fields ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Company,
    Ticker,
    ByValue,
    Price,
    DailyChange,
    Country,
    MarketPrice,
    PreviousClose,
    Volume,
    PeRatio,
    EpsRatio,
    MarketCap,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Ticker => "ticker",
            Self::ByValue => "by-value",
            Self::Price => "price",
            Self::DailyChange => "daily change",
            Self::Country => "country",
            Self::MarketPrice => "market price",
            Self::PreviousClose => "previous close",
            Self::Volume => "volume",
            Self::PeRatio => "P/E ratio",
            Self::EpsRatio => "EPS ratio",
            Self::MarketCap => "market cap",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field → raw text, as located in the markup. Nothing is coerced yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFields(BTreeMap<Field, String>);

impl RawFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: Field, value: impl Into<String>) {
        self.0.insert(field, value.into());
    }

    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn require(&self, field: Field, context: &str) -> Result<&str, ScrapeError> {
        self.get(field)
            .ok_or_else(|| ScrapeError::missing(field.as_str(), context))
    }
}
