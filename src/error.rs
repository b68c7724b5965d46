use thiserror::Error;

/// Typed failures raised while fetching, extracting, coercing or merging.
///
/// Pipelines wrap these in `anyhow` with context; tests match on the kind
/// through `downcast_ref`.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("fetch of {url} failed after {attempts} attempts: {last}")]
    FetchExhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Box<ScrapeError>,
    },

    #[error("invalid selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },

    #[error("missing {field} in {context}")]
    MissingField { field: &'static str, context: String },

    #[error("invalid volume {raw:?} for {symbol}")]
    InvalidVolume { symbol: String, raw: String },

    #[error("no files match {0}")]
    NoFilesMatched(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("DuckDB: {0}")]
    Database(#[from] duckdb::Error),
}

impl ScrapeError {
    pub fn missing(field: &'static str, context: impl Into<String>) -> Self {
        Self::MissingField {
            field,
            context: context.into(),
        }
    }
}
