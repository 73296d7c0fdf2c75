//! Ingestion run configuration
//!
//! Page limit, batch capacity, timeout, and credentials are externally
//! supplied (CLI flags, environment, or an embedding scheduler); the core
//! treats them as constructor parameters, not owned state.

use crate::error::{IngestError, Result};
use crate::yellow_taxi::YELLOW_TAXI_TRIPS_2022_URL;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum rows requested per page (`$limit`)
pub const DEFAULT_PAGE_LIMIT: u64 = 500_000;

/// Records buffered in memory before a flush to the artifact
pub const DEFAULT_BATCH_CAPACITY: usize = 100_000;

/// Request timeout. The upstream API is known to be slow for large pages.
pub const DEFAULT_TIMEOUT_SECS: u64 = 90;

/// Configuration for one ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Dataset base URL, without the `.json` format suffix
    pub base_url: String,

    /// Socrata application token (`$$app_token`); omitted from the request
    /// when not set, at the cost of throttling
    pub app_token: Option<String>,

    /// Rows requested per page (`$limit`)
    pub page_limit: u64,

    /// Records accumulated in memory before each flush
    pub batch_capacity: usize,

    /// Timeout covering the request and the streamed body read
    pub timeout: Duration,

    /// Fail fast at startup when `page_limit % batch_capacity != 0`.
    ///
    /// When off (the default), a misaligned configuration reproduces the
    /// legacy behavior: the run terminates after the first page even if a
    /// full page was returned, because the final short flush of every page
    /// is indistinguishable from an exhausted result set.
    pub enforce_batch_alignment: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            base_url: YELLOW_TAXI_TRIPS_2022_URL.to_string(),
            app_token: None,
            page_limit: DEFAULT_PAGE_LIMIT,
            batch_capacity: DEFAULT_BATCH_CAPACITY,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            enforce_batch_alignment: false,
        }
    }
}

impl IngestConfig {
    /// Validate the configuration before the first request is issued
    pub fn validate(&self) -> Result<()> {
        if self.page_limit == 0 {
            return Err(IngestError::Config("page_limit must be positive".into()));
        }
        if self.batch_capacity == 0 {
            return Err(IngestError::Config(
                "batch_capacity must be positive".into(),
            ));
        }
        if self.enforce_batch_alignment && self.page_limit % self.batch_capacity as u64 != 0 {
            return Err(IngestError::Config(format!(
                "page_limit ({}) must be a multiple of batch_capacity ({}) \
                 or pagination terminates after the first page",
                self.page_limit, self.batch_capacity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        IngestConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_page_limit_is_rejected() {
        let config = IngestConfig {
            page_limit: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            IngestError::Config(_)
        ));
    }

    #[test]
    fn zero_batch_capacity_is_rejected() {
        let config = IngestConfig {
            batch_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            IngestError::Config(_)
        ));
    }

    #[test]
    fn misaligned_sizes_pass_by_default() {
        let config = IngestConfig {
            page_limit: 5,
            batch_capacity: 2,
            ..Default::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn misaligned_sizes_fail_under_strict_policy() {
        let config = IngestConfig {
            page_limit: 5,
            batch_capacity: 2,
            enforce_batch_alignment: true,
            ..Default::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            IngestError::Config(_)
        ));
    }
}
