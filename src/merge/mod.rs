//! Joins the per-category listing files into one table.
//!
//! Every category's files are globbed, concatenated into an in-memory DuckDB
//! table (all columns VARCHAR, so keys compare as written), then inner-joined
//! on [`JOIN_KEYS`]. Empty key cells load as NULL and match each other.
//! Rows keep the first category's order.

use anyhow::{Context, Result};
use duckdb::{Connection, params};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::ScrapeError;
use crate::models::Category;
use crate::storage::{listing_glob, write_merged};

pub const JOIN_KEYS: [&str; 5] = ["ticker", "company", "country", "price", "daily change"];

fn quote_ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[derive(Debug)]
pub struct MergedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

pub struct Merger {
    conn: Connection,
}

impl Merger {
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory DuckDB")?;
        Ok(Self { conn })
    }

    /// Files matching `pattern`, sorted. No match is an error.
    pub fn matching_files(&self, pattern: &str) -> Result<Vec<String>> {
        let sql = format!("SELECT file FROM glob({}) ORDER BY file", quote_literal(pattern));
        let mut stmt = self.conn.prepare(&sql).map_err(ScrapeError::from)?;
        let files = stmt
            .query_map([], |r| r.get::<_, String>(0))
            .map_err(ScrapeError::from)?
            .collect::<duckdb::Result<Vec<String>>>()
            .map_err(ScrapeError::from)?;

        if files.is_empty() {
            return Err(ScrapeError::NoFilesMatched(pattern.to_string()).into());
        }
        Ok(files)
    }

    /// Concatenate `files` row-wise into `table`; returns the row count.
    fn load_table(&self, table: &str, files: &[String]) -> Result<i64> {
        let list = files
            .iter()
            .map(|f| quote_literal(f))
            .collect::<Vec<_>>()
            .join(", ");
        self.conn
            .execute_batch(&format!(
                "CREATE OR REPLACE TABLE {table} AS \
                 SELECT * FROM read_csv([{list}], header = true, all_varchar = true, union_by_name = true)"
            ))
            .map_err(ScrapeError::from)
            .with_context(|| format!("Failed to load {:?}", files))?;

        let rows: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .map_err(ScrapeError::from)?;
        Ok(rows)
    }

    fn columns_of(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT column_name FROM information_schema.columns \
                 WHERE table_name = ? ORDER BY ordinal_position",
            )
            .map_err(ScrapeError::from)?;
        let cols = stmt
            .query_map(params![table], |r| r.get::<_, String>(0))
            .map_err(ScrapeError::from)?
            .collect::<duckdb::Result<Vec<String>>>()
            .map_err(ScrapeError::from)?;
        Ok(cols)
    }

    /// Load one table per category and inner-join them on the key tuple.
    pub fn merge(&self, categories: &[Category], dir: &Path, suffix: &str) -> Result<MergedTable> {
        let mut tables = Vec::with_capacity(categories.len());
        for (i, category) in categories.iter().enumerate() {
            let pattern = listing_glob(dir, &category.by, suffix);
            let files = self.matching_files(&pattern)?;
            info!("{}: {} file(s) match {}", category.by, files.len(), pattern);
            debug!("{:?}", files);

            let table = format!("cat_{i}");
            let rows = self.load_table(&table, &files)?;
            info!("{}: {} rows loaded", category.by, rows);
            tables.push(table);
        }

        let Some((first, rest)) = tables.split_first() else {
            return Ok(MergedTable { headers: vec![], rows: vec![] });
        };

        let mut headers = Vec::new();
        let mut select = Vec::new();
        for col in self.columns_of(first)? {
            select.push(format!("{first}.{}", quote_ident(&col)));
            headers.push(col);
        }

        let mut joins = String::new();
        for table in rest {
            let on = JOIN_KEYS
                .iter()
                .map(|k| format!("{first}.{0} IS NOT DISTINCT FROM {table}.{0}", quote_ident(k)))
                .collect::<Vec<_>>()
                .join(" AND ");
            joins.push_str(&format!(" JOIN {table} ON {on}"));

            for col in self.columns_of(table)? {
                if !JOIN_KEYS.contains(&col.as_str()) {
                    select.push(format!("{table}.{}", quote_ident(&col)));
                    headers.push(col);
                }
            }
        }

        let order = tables
            .iter()
            .map(|t| format!("{t}.rowid"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {first}{joins} ORDER BY {order}",
            select.join(", ")
        );
        debug!("{}", sql);

        let width = headers.len();
        let mut stmt = self.conn.prepare(&sql).map_err(ScrapeError::from)?;
        let rows = stmt
            .query_map([], |r| {
                (0..width)
                    .map(|i| r.get::<_, Option<String>>(i).map(Option::unwrap_or_default))
                    .collect::<duckdb::Result<Vec<String>>>()
            })
            .map_err(ScrapeError::from)?
            .collect::<duckdb::Result<Vec<Vec<String>>>>()
            .map_err(ScrapeError::from)?;

        Ok(MergedTable { headers, rows })
    }
}

/// Merge every configured category and write `output`.
pub fn merge_to_file(
    categories: &[Category],
    dir: &Path,
    suffix: &str,
    output: &Path,
) -> Result<MergeOutcome> {
    let merged = Merger::open_in_memory()?.merge(categories, dir, suffix)?;
    write_merged(output, &merged.headers, &merged.rows)?;
    info!(
        "Merged {} rows x {} columns into {:?}",
        merged.rows.len(),
        merged.headers.len(),
        output
    );

    Ok(MergeOutcome {
        path: output.to_path_buf(),
        rows: merged.rows.len(),
        columns: merged.headers.len(),
    })
}
