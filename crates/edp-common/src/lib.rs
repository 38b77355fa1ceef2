//! EDP Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities and error handling for the EDP workspace members.
//!
//! # Overview
//!
//! This crate provides functionality used across the EDP workspace:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Logging**: Centralized tracing initialization
//! - **Checksums**: Snapshot integrity verification utilities
//!
//! # Example
//!
//! ```no_run
//! use edp_common::{Result, checksum};
//!
//! fn fingerprint(payload: &[u8]) -> Result<()> {
//!     let digest = checksum::sha256_hex(payload);
//!     tracing::info!(%digest, "Payload fingerprinted");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{EdpError, Result};
