use scraper::{ElementRef, Html, Selector};

use crate::error::ScrapeError;
use crate::models::{Field, RawFields};

// ── Extraction interface ──────────────────────────────────────────────────────

/// Which layout a document is read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Ranking table: one mapping per company row.
    Listing,
    /// Single ticker page: zero mappings when the heading is missing, else one.
    Detail,
    /// Ranking table, ticker codes only.
    Symbols,
}

/// Pulls raw field text out of a parsed page. Swapping the implementation
/// retargets the pipeline at a different site layout.
pub trait FieldExtractor {
    fn extract(&self, profile: Profile, doc: &Html) -> Result<Vec<RawFields>, ScrapeError>;
}

/// Parse a response body. Every accepted parser identifier maps onto
/// html5ever, so the name only shows up in logs.
pub fn parse_document(body: &str, parser: &str) -> Html {
    tracing::trace!("parsing {} bytes with {}", body.len(), parser);
    Html::parse_document(body)
}

/// "Apple Inc. (AAPL)" → ("Apple Inc.", "AAPL"). Splits on the last `(`, so
/// parentheses inside the company name survive.
pub fn split_name_and_symbol(heading: &str) -> (String, String) {
    match heading.rsplit_once('(') {
        Some((name, symbol)) => (
            name.trim().to_string(),
            symbol.trim_matches(')').to_string(),
        ),
        None => (String::new(), heading.trim_matches(')').to_string()),
    }
}

// ── Selector-based extractor ──────────────────────────────────────────────────

fn selector(s: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(s).map_err(|e| ScrapeError::Selector {
        selector: s.to_string(),
        reason: format!("{e:?}"),
    })
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect()
}

/// Positional extractor for companiesmarketcap.com rankings and Yahoo Finance
/// quote pages.
pub struct MarkupExtractor {
    table_body: Selector,
    row: Selector,
    company_name: Selector,
    company_code: Selector,
    right_cell: Selector,
    span: Selector,
    hidden_span: Selector,
    heading: Selector,
    market_price: Selector,
    previous_close: Selector,
    volume: Selector,
    pe_ratio: Selector,
    eps_ratio: Selector,
    market_cap: Selector,
}

impl MarkupExtractor {
    pub fn new() -> Result<Self, ScrapeError> {
        Ok(Self {
            table_body: selector("tbody")?,
            row: selector("tr")?,
            company_name: selector("div.company-name")?,
            company_code: selector("div.company-code")?,
            right_cell: selector("td.td-right")?,
            span: selector("span")?,
            hidden_span: selector("span.responsive-hidden")?,
            heading: selector("h1")?,
            market_price: selector(r#"fin-streamer[data-field="regularMarketPrice"]"#)?,
            previous_close: selector(r#"td[data-test="PREV_CLOSE-value"]"#)?,
            volume: selector(r#"td[data-test="TD_VOLUME-value"]"#)?,
            pe_ratio: selector(r#"td[data-test="PE_RATIO-value"]"#)?,
            eps_ratio: selector(r#"td[data-test="EPS_RATIO-value"]"#)?,
            market_cap: selector(r#"td[data-test="MARKET_CAP-value"]"#)?,
        })
    }

    fn listing_rows(&self, doc: &Html) -> Result<Vec<RawFields>, ScrapeError> {
        let body = doc
            .select(&self.table_body)
            .next()
            .ok_or_else(|| ScrapeError::missing("table body", "listing page"))?;

        let mut rows = Vec::new();
        for (i, tr) in body.select(&self.row).enumerate() {
            let ctx = format!("listing row {}", i + 1);
            let nth = |sel: &Selector, n: usize, what: &'static str| {
                tr.select(sel)
                    .nth(n)
                    .map(text_of)
                    .ok_or_else(|| ScrapeError::missing(what, ctx.clone()))
            };

            rows.push(
                RawFields::new()
                    .with(Field::Company, nth(&self.company_name, 0, "company name")?.trim())
                    .with(Field::Ticker, nth(&self.company_code, 0, "company code")?)
                    .with(Field::ByValue, nth(&self.right_cell, 1, "by-value cell")?)
                    .with(Field::Price, nth(&self.right_cell, 2, "price cell")?)
                    .with(Field::DailyChange, nth(&self.span, 1, "daily change")?)
                    .with(Field::Country, nth(&self.hidden_span, 0, "country")?),
            );
        }
        Ok(rows)
    }

    fn detail(&self, doc: &Html) -> Result<Vec<RawFields>, ScrapeError> {
        let Some(heading) = doc.select(&self.heading).next() else {
            return Ok(vec![]);
        };
        let (company, ticker) = split_name_and_symbol(&text_of(heading));
        let ctx = format!("detail page for {ticker}");

        let required = |sel: &Selector, what: &'static str| {
            doc.select(sel)
                .next()
                .map(text_of)
                .ok_or_else(|| ScrapeError::missing(what, ctx.clone()))
        };

        let mut fields = RawFields::new()
            .with(Field::MarketPrice, required(&self.market_price, "market price")?)
            .with(Field::PreviousClose, required(&self.previous_close, "previous close")?)
            .with(Field::Volume, required(&self.volume, "volume")?)
            .with(Field::PeRatio, required(&self.pe_ratio, "P/E ratio")?)
            .with(Field::EpsRatio, required(&self.eps_ratio, "EPS ratio")?)
            .with(Field::Company, company)
            .with(Field::Ticker, ticker);

        // Indices and funds have no market cap.
        if let Some(cap) = doc.select(&self.market_cap).next() {
            fields.insert(Field::MarketCap, text_of(cap));
        } else {
            fields.insert(Field::MarketCap, "0");
        }

        Ok(vec![fields])
    }

    fn symbols(&self, doc: &Html) -> Vec<RawFields> {
        doc.select(&self.company_code)
            .map(|el| RawFields::new().with(Field::Ticker, text_of(el).trim()))
            .collect()
    }
}

impl FieldExtractor for MarkupExtractor {
    fn extract(&self, profile: Profile, doc: &Html) -> Result<Vec<RawFields>, ScrapeError> {
        match profile {
            Profile::Listing => self.listing_rows(doc),
            Profile::Detail => self.detail(doc),
            Profile::Symbols => Ok(self.symbols(doc)),
        }
    }
}
