use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::Path;
use tracing::info;

use crate::models::{DetailRecord, DetailRow, ListingRecord};
use crate::utils::fmt_number;

/// Rows shown by [`verify_results`].
pub const SAMPLE_ROWS: usize = 5;

// ── File names ────────────────────────────────────────────────────────────────

/// `{end}_{by}{suffix}{YYYY-MM-DD}.csv`, e.g. `200_marketcap_companies_2024-03-01.csv`
pub fn listing_file_name(end_index: i64, by: &str, suffix: &str, date: NaiveDate) -> String {
    format!("{}_{}{}{}.csv", end_index, by, suffix, date.format("%Y-%m-%d"))
}

/// `{start}_to_{end}{suffix}{YYYY-MM-DD}.csv`
pub fn detail_file_name(start: i64, end: i64, suffix: &str, date: NaiveDate) -> String {
    format!("{}_to_{}{}{}.csv", start, end, suffix, date.format("%Y-%m-%d"))
}

/// Glob selecting every listing file written for the `by` column.
pub fn listing_glob(dir: &Path, by: &str, suffix: &str) -> String {
    dir.join(format!("*_{by}{suffix}*.csv"))
        .to_string_lossy()
        .into_owned()
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Could not create dir {:?}", parent))?;
    }
    Ok(())
}

// ── Writers ───────────────────────────────────────────────────────────────────

/// Replace `path` with the whole table.
pub fn write_listing_table(path: &Path, by: &str, table: &[ListingRecord]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to open {:?}", path))?;

    writer.write_record(ListingRecord::header(by))?;
    for record in table {
        writer.write_record(record.to_row())?;
    }
    writer.flush()?;
    Ok(())
}

/// Replace `path` with the batch. Sentinels become rows of empty cells.
pub fn write_detail_batch(path: &Path, batch: &[DetailRow]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to open {:?}", path))?;

    writer.write_record(DetailRecord::COLUMNS)?;
    for row in batch {
        match row {
            Some(record) => writer.serialize(record)?,
            None => writer.write_record(DetailRecord::COLUMNS.map(|_| ""))?,
        }
    }
    writer.flush()?;

    info!("Writing to file {:?} completed", path);
    Ok(())
}

/// Merged output: a zero-based unnamed index column, then `headers`.
pub fn write_merged(path: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to open {:?}", path))?;

    writer.write_record(std::iter::once("").chain(headers.iter().map(String::as_str)))?;
    for (i, row) in rows.iter().enumerate() {
        let index = i.to_string();
        writer.write_record(
            std::iter::once(index.as_str()).chain(row.iter().map(String::as_str)),
        )?;
    }
    writer.flush()?;
    Ok(())
}

// ── Read-back check ───────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct VerifySummary {
    pub headers: Vec<String>,
    pub rows: usize,
    /// Rows with a non-empty `Symbol`; sentinels are not counted.
    pub symbols: usize,
    pub sample: Vec<Vec<String>>,
}

/// Read a written detail file back and log its size and first rows.
pub fn verify_results(path: &Path) -> Result<VerifySummary> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to reopen {:?}", path))?;

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let symbol_idx = headers.iter().position(|h| h == "Symbol");

    let mut rows = 0usize;
    let mut symbols = 0usize;
    let mut sample: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("Bad row in {:?}", path))?;
        rows += 1;
        if symbol_idx.and_then(|i| record.get(i)).is_some_and(|s| !s.is_empty()) {
            symbols += 1;
        }
        if sample.len() < SAMPLE_ROWS {
            sample.push(record.iter().map(str::to_string).collect());
        }
    }

    info!("Checking output written to {:?}", path);
    info!(
        "Number of records written to the file: {} ({} with a symbol)",
        fmt_number(rows as i64),
        fmt_number(symbols as i64)
    );
    info!("Sample output: {}", headers.join(","));
    for row in &sample {
        info!("  {}", row.join(","));
    }

    Ok(VerifySummary {
        headers,
        rows,
        symbols,
        sample,
    })
}
