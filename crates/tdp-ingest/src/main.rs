//! TDP Ingest - Data ingestion tool

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tdp_common::logging::{init_logging, LogConfig, LogLevel};
use tdp_ingest::checks;
use tdp_ingest::config::{
    IngestConfig, DEFAULT_BATCH_CAPACITY, DEFAULT_PAGE_LIMIT, DEFAULT_TIMEOUT_SECS,
};
use tdp_ingest::yellow_taxi;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "tdp-ingest")]
#[command(author, version, about = "TDP data ingestion tool")]
struct Cli {
    /// Operation to run
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Ingest yellow-taxi trip records for one or more monthly partitions
    Ingest {
        /// Partition keys (first-of-month dates, e.g. 2022-06-01); each
        /// partition runs as an independent pipeline
        #[arg(short, long, required = true)]
        partition: Vec<String>,

        /// Output directory for CSV artifacts
        #[arg(short, long, default_value = "./data/csv")]
        output: PathBuf,

        /// Rows requested per page
        #[arg(long, default_value_t = DEFAULT_PAGE_LIMIT)]
        page_limit: u64,

        /// Records buffered in memory before each flush
        #[arg(long, default_value_t = DEFAULT_BATCH_CAPACITY)]
        batch_capacity: usize,

        /// Request timeout in seconds
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout_secs: u64,

        /// Fail fast when the page limit is not a multiple of the batch
        /// capacity, instead of silently stopping after the first page
        #[arg(long)]
        strict_batching: bool,

        /// Socrata application token
        #[arg(long, env = "NYC_OPEN_DATA_APP_TOKEN", hide_env_values = true)]
        app_token: Option<String>,

        /// Override the dataset base URL (without the format suffix)
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Verify produced artifacts (row counts, checksums, validation checks)
    Verify {
        /// Directory containing the CSV artifacts
        #[arg(short, long, default_value = "./data/csv")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging based on verbose flag
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("tdp-ingest".to_string())
        .build();

    // Merge with environment variables (they take precedence)
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    init_logging(&log_config)?;

    match cli.command {
        Command::Ingest {
            partition,
            output,
            page_limit,
            batch_capacity,
            timeout_secs,
            strict_batching,
            app_token,
            base_url,
        } => {
            let mut config = IngestConfig {
                app_token,
                page_limit,
                batch_capacity,
                timeout: Duration::from_secs(timeout_secs),
                enforce_batch_alignment: strict_batching,
                ..Default::default()
            };
            if let Some(base_url) = base_url {
                config.base_url = base_url;
            }

            let keys = partition
                .iter()
                .map(|raw| {
                    raw.parse::<NaiveDate>()
                        .with_context(|| format!("invalid partition key '{raw}'"))
                })
                .collect::<Result<Vec<_>>>()?;

            // Partitions are independent pipelines with partition-scoped
            // artifact names; run them concurrently.
            let runs = keys
                .iter()
                .map(|&key| yellow_taxi::ingest(&config, key, &output));
            let reports = futures::future::try_join_all(runs).await?;

            for report in &reports {
                info!(
                    partition = %report.partition,
                    artifact = %report.artifact.display(),
                    rows = report.records_written,
                    pages = report.pages,
                    "partition ingested"
                );
            }
        },
        Command::Verify { dir } => {
            let reports = checks::verify_artifacts(&dir)?;
            if reports.is_empty() {
                anyhow::bail!("no artifacts found in {}", dir.display());
            }

            let mut failures = 0usize;
            for report in &reports {
                if report.passed() {
                    info!(artifact = %report.metadata, "artifact verified");
                } else {
                    failures += 1;
                    error!(
                        artifact = %report.metadata,
                        failed = ?report.failed_checks,
                        "artifact failed verification"
                    );
                }
            }
            if failures > 0 {
                anyhow::bail!("{failures} artifact(s) failed verification");
            }
        },
    }

    info!("Done");
    Ok(())
}
