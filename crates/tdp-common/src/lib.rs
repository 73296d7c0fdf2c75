//! TDP Common Library
//!
//! Shared types, utilities, and error handling for the TDP workspace.
//!
//! # Overview
//!
//! This crate provides common functionality used across all TDP workspace
//! members:
//!
//! - **Error Handling**: Custom error types and result aliases
//! - **Logging**: Centralized tracing initialization
//! - **Checksums**: Artifact integrity verification utilities
//! - **Types**: Shared domain types
//!
//! # Example
//!
//! ```no_run
//! use tdp_common::checksum::sha256_file;
//! use tdp_common::Result;
//!
//! fn fingerprint(path: &str) -> Result<()> {
//!     let digest = sha256_file(path)?;
//!     tracing::info!(%digest, "artifact checksum");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, TdpError};
