mod config;
mod error;
mod merge;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::pipeline::{DetailScraper, ListingScraper};
use crate::scraper::{HttpClient, MarkupExtractor};

#[derive(Parser)]
#[command(name = "market-scrape", about = "Stock ranking and quote page scraper", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

/// Overrides for the slice of the ranking to scrape
#[derive(clap::Args)]
struct Slice {
    /// Number of companies (default: web.max_companies)
    #[arg(short, long, env = "SCRAPER_COUNT")]
    count: Option<u32>,

    /// 1-based rank to start from (default: web.start_from)
    #[arg(short, long, env = "SCRAPER_START", allow_negative_numbers = true)]
    start: Option<i64>,
}

impl Slice {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(count) = self.count {
            config.web.max_companies = count;
        }
        if let Some(start) = self.start {
            config.web.start_from = start;
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Scrape the ranking tables, one CSV per category
    Listing {
        #[command(flatten)]
        slice: Slice,
    },

    /// Scrape each ranked ticker's quote page into one CSV
    Detail {
        #[command(flatten)]
        slice: Slice,
    },

    /// Join previously scraped ranking CSVs into the merged file
    Merge,

    /// Print the resolved configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // before clap, so SCRAPER_COUNT / SCRAPER_START from .env are seen
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "market_scrape=info,warn",
        1 => "market_scrape=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let mut config = AppConfig::load()?;

    match cli.command {
        Command::Listing { slice } => {
            slice.apply(&mut config);
            info!("{}", serde_json::to_string(&config)?);
            let _t = utils::Timer::start("Listing scrape");

            let scraper = ListingScraper::new(
                &config,
                HttpClient::new(&config.web)?,
                MarkupExtractor::new()?,
            );
            for outcome in scraper.run(utils::today()).await? {
                if !outcome.written {
                    warn!("{}: empty page range, nothing written", outcome.by);
                    continue;
                }
                info!(
                    "{}: {} rows from {} pages → {:?}",
                    outcome.by, outcome.rows, outcome.pages, outcome.path
                );
            }
        }

        Command::Detail { slice } => {
            slice.apply(&mut config);
            info!("{}", serde_json::to_string(&config)?);
            let _t = utils::Timer::start("Detail scrape");

            let scraper = DetailScraper::new(
                &config,
                HttpClient::new(&config.web)?,
                MarkupExtractor::new()?,
            );
            let outcome = scraper.run(utils::today()).await?;
            info!(
                "Done: {} symbols, {} unavailable, {} rows x {} columns read back → {:?}",
                outcome.symbols,
                outcome.sentinels,
                outcome.summary.rows,
                outcome.summary.headers.len(),
                outcome.path
            );
            let scraped = outcome.symbols - outcome.sentinels;
            if outcome.summary.symbols != scraped {
                warn!(
                    "Read back {} rows with a symbol, expected {}",
                    outcome.summary.symbols, scraped
                );
            }
            debug!("Read-back sample: {:?}", outcome.summary.sample);
        }

        Command::Merge => {
            let _t = utils::Timer::start("Merge");
            let output = config.output.dir.join(&config.output.merged_file);
            let outcome = merge::merge_to_file(
                &config.web.companies_by,
                &config.output.dir,
                &config.web.output_filename,
                &output,
            )?;
            info!(
                "Done: {} rows, {} columns → {:?}",
                outcome.rows, outcome.columns, outcome.path
            );
        }

        Command::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
