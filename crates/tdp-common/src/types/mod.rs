//! Common types used across TDP

use serde::{Deserialize, Serialize};

/// Metadata describing one produced ingestion artifact
///
/// Built by the verification path after a run; `data_rows` excludes the
/// header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Path to the artifact file
    pub path: String,

    /// Number of data rows (header excluded)
    pub data_rows: u64,

    /// File size in bytes
    pub size_bytes: u64,

    /// Hex-encoded SHA-256 of the file contents
    pub sha256: String,
}

impl std::fmt::Display for ArtifactMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} rows, {} bytes, sha256 {})",
            self.path, self.data_rows, self.size_bytes, self.sha256
        )
    }
}
