//! Error types for the ingestion core
//!
//! Every variant is terminal for the run it occurs in: the run stops, and
//! whatever batches were flushed before the failure remain on disk. The run
//! never rolls an artifact back and never writes a completeness sentinel.

use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Main error type for the ingestion core
#[derive(Debug, Error)]
pub enum IngestError {
    /// The partition key is not a valid first-of-month date inside the
    /// partition range. Non-retryable.
    #[error("invalid partition key '{key}': {reason}")]
    InvalidPartition { key: String, reason: String },

    /// Network or HTTP failure, carrying the upstream status when one was
    /// received. No retry is performed at this layer.
    #[error("transport error: {source}")]
    Transport {
        /// HTTP status of the failed response, if the failure happened after
        /// headers were received
        status: Option<StatusCode>,
        #[source]
        source: reqwest::Error,
    },

    /// Failure while reading the streamed response body
    #[error("response stream error: {0}")]
    Stream(#[source] std::io::Error),

    /// A response line failed to parse after array framing was stripped.
    /// Fatal for the page: skipping it would break the downstream row count.
    #[error("malformed record line {line:?}: {source}")]
    MalformedRecord {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// Durable-storage failure during a flush. Previously flushed batches
    /// remain valid on disk.
    #[error("failed to write artifact {}: {source}", .path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration, rejected before the first request
    #[error("configuration error: {0}")]
    Config(String),
}
