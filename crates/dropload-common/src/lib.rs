//! Dropload Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the dropload workspace.
//!
//! - **Error Handling**: [`DroploadError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber setup driven by [`logging::LogConfig`]
//! - **Types**: column datatypes and import statuses shared by the store and the engine
//! - **Checksums**: SHA-256 fingerprints for data files
//!
//! # Example
//!
//! ```no_run
//! use dropload_common::checksum::file_sha256;
//! use dropload_common::Result;
//!
//! fn fingerprint(path: &str) -> Result<()> {
//!     let digest = file_sha256(path)?;
//!     tracing::info!(%digest, "Data file fingerprinted");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{DroploadError, Result};
pub use types::{Datatype, ImportStatus};
