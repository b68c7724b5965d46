use crate::error::ScrapeError;
use crate::models::{DetailRecord, Field, ListingRecord, RawFields};

// ── Coercion primitives ───────────────────────────────────────────────────────

/// Drop thousands separators: "1,234,567.8" → "1234567.8"
pub fn strip_thousands(s: &str) -> String {
    s.replace(',', "")
}

/// Lenient float: anything unparseable ("N/A", "", "—") becomes 0.
pub fn float_or_na(s: &str) -> f64 {
    s.trim().parse().unwrap_or(0.0)
}

/// Strict integer volume. "N/A" or "1.2M" is an error, not a zero.
pub fn parse_volume(symbol: &str, s: &str) -> Result<i64, ScrapeError> {
    s.trim().parse().map_err(|_| ScrapeError::InvalidVolume {
        symbol: symbol.to_string(),
        raw: s.to_string(),
    })
}

/// Two decimals, exact halves go to the even neighbour.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round_ties_even() / 100.0
}

// ── Listing row ───────────────────────────────────────────────────────────────

pub fn listing_record(fields: &RawFields) -> Result<ListingRecord, ScrapeError> {
    let ctx = "listing row";
    Ok(ListingRecord {
        company: fields.require(Field::Company, ctx)?.trim().to_string(),
        ticker: fields.require(Field::Ticker, ctx)?.trim().to_string(),
        by_value: strip_thousands(fields.require(Field::ByValue, ctx)?).trim().to_string(),
        price: strip_thousands(fields.require(Field::Price, ctx)?),
        daily_change: fields.require(Field::DailyChange, ctx)?.to_string(),
        country: fields.require(Field::Country, ctx)?.to_string(),
    })
}

// ── Detail row ────────────────────────────────────────────────────────────────

/// Coerce one detail page. Price-family fields fall back to 0, volume does not.
pub fn detail_record(symbol: &str, fields: &RawFields) -> Result<DetailRecord, ScrapeError> {
    let ctx = format!("detail page for {symbol}");
    let number = |field: Field| -> Result<f64, ScrapeError> {
        Ok(float_or_na(&strip_thousands(fields.require(field, &ctx)?)))
    };

    let market_price = number(Field::MarketPrice)?;
    let previous_close = number(Field::PreviousClose)?;
    let pe_ratio = number(Field::PeRatio)?;
    let eps_ratio = number(Field::EpsRatio)?;
    let volume = parse_volume(
        symbol,
        &strip_thousands(fields.require(Field::Volume, &ctx)?),
    )?;
    let market_cap = fields
        .get(Field::MarketCap)
        .map(strip_thousands)
        .unwrap_or_else(|| "0".to_string());

    Ok(DetailRecord {
        company: strip_thousands(fields.require(Field::Company, &ctx)?),
        symbol: fields.require(Field::Ticker, &ctx)?.to_string(),
        market_price,
        previous_close,
        change_in_price: round2(market_price - previous_close),
        pe_ratio,
        eps_ratio,
        volume,
        market_cap,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn detail_fields() -> RawFields {
        RawFields::new()
            .with(Field::Company, "Apple Inc.")
            .with(Field::Ticker, "AAPL")
            .with(Field::MarketPrice, "150.25")
            .with(Field::PreviousClose, "148.00")
            .with(Field::Volume, "52,164,520")
            .with(Field::PeRatio, "24.61")
            .with(Field::EpsRatio, "6.11")
    }

    #[test]
    fn test_float_or_na() {
        assert_eq!(float_or_na(&strip_thousands("1,234.5")), 1234.5);
        assert_eq!(float_or_na("N/A"), 0.0);
        assert_eq!(float_or_na(""), 0.0);
        assert_eq!(float_or_na(" 42 "), 42.0);
    }

    #[test]
    fn test_parse_volume_is_strict() {
        assert_eq!(parse_volume("AAPL", "1234").unwrap(), 1234);
        let err = parse_volume("AAPL", "N/A").unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidVolume { ref raw, .. } if raw == "N/A"));
        assert!(parse_volume("AAPL", "1.2M").is_err());
    }

    #[test]
    fn test_change_in_price_rounds() {
        let rec = detail_record("AAPL", &detail_fields()).unwrap();
        assert_eq!(rec.change_in_price, 2.25);
        assert_eq!(rec.volume, 52_164_520);
        assert_eq!(round2(0.1 + 0.2), 0.3);
    }

    #[test]
    fn test_round2_halves_to_even() {
        assert_eq!(round2(10.125 - 10.0), 0.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(-0.125), -0.12);
    }

    #[test]
    fn missing_market_cap_defaults_to_zero() {
        let rec = detail_record("AAPL", &detail_fields()).unwrap();
        assert_eq!(rec.market_cap, "0");

        let rec = detail_record(
            "AAPL",
            &detail_fields().with(Field::MarketCap, "2,450,000,000"),
        )
        .unwrap();
        assert_eq!(rec.market_cap, "2450000000");
    }

    #[test]
    fn unparseable_prices_become_zero() {
        let fields = detail_fields()
            .with(Field::PreviousClose, "N/A")
            .with(Field::PeRatio, "");
        let rec = detail_record("AAPL", &fields).unwrap();
        assert_eq!(rec.previous_close, 0.0);
        assert_eq!(rec.pe_ratio, 0.0);
        assert_eq!(rec.change_in_price, 150.25);
    }

    #[test]
    fn missing_volume_is_fatal() {
        let mut fields = RawFields::new();
        for (field, value) in [
            (Field::Company, "Apple Inc."),
            (Field::Ticker, "AAPL"),
            (Field::MarketPrice, "1"),
            (Field::PreviousClose, "1"),
            (Field::PeRatio, "1"),
            (Field::EpsRatio, "1"),
        ] {
            fields.insert(field, value);
        }
        let err = detail_record("AAPL", &fields).unwrap_err();
        assert!(matches!(err, ScrapeError::MissingField { field: "volume", .. }));
    }

    #[test]
    fn company_name_loses_commas() {
        let fields = detail_fields().with(Field::Company, "Foo, Inc.");
        assert_eq!(detail_record("FOO", &fields).unwrap().company, "Foo Inc.");
    }

    #[test]
    fn listing_record_strips_commas() {
        let fields = RawFields::new()
            .with(Field::Company, "Apple\r\n")
            .with(Field::Ticker, "AAPL")
            .with(Field::ByValue, " 2,900,000,000,000 ")
            .with(Field::Price, "$1,150.25")
            .with(Field::DailyChange, "1.20%")
            .with(Field::Country, "USA");
        let rec = listing_record(&fields).unwrap();
        assert_eq!(rec.company, "Apple");
        assert_eq!(rec.by_value, "2900000000000");
        assert_eq!(rec.price, "$1150.25");
    }
}
