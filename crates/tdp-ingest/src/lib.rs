//! TDP Ingest Library
//!
//! Streaming ingestion of NYC TLC trip-record datasets from the Socrata
//! open-data API into per-partition CSV artifacts.
//!
//! The core is a bounded-memory pipeline: paginated requests stream their
//! line-framed response bodies through a record decoder into a fixed-size
//! accumulator, which is flushed to the artifact batch by batch. Each
//! monthly partition is one independent run; the orchestration scheduler,
//! columnar conversion, and table loads live outside this crate and consume
//! only the artifact files it produces.
//!
//! # Example
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use std::path::Path;
//! use tdp_ingest::config::IngestConfig;
//! use tdp_ingest::yellow_taxi;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::default();
//!     let partition = NaiveDate::from_ymd_opt(2022, 6, 1).unwrap();
//!     let report = yellow_taxi::ingest(&config, partition, Path::new("./data/csv")).await?;
//!     println!("{} rows written", report.records_written);
//!     Ok(())
//! }
//! ```

pub mod accumulator;
pub mod artifact;
pub mod checks;
pub mod config;
pub mod decode;
pub mod error;
pub mod partition;
pub mod socrata;
pub mod yellow_taxi;

// Re-export commonly used types
pub use error::{IngestError, Result};
