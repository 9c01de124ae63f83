//! Dropload ingester
//!
//! Loads fixed-width data files into PostgreSQL according to declared column
//! layouts, with a journal that makes every file idempotent and resumable.
//!
//! - [`spec`]: column layouts, spec source parsing and the row codec
//! - [`registry`]: persisting, reloading and deleting specs
//! - [`filename`]: the `<spec>_<timestamp><label>.txt` naming convention
//! - [`journal`]: per-file import progress
//! - [`engine`]: the sweep that ties them together
//! - [`store`]: the persistence boundary, with PostgreSQL and in-memory backends
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use dropload_ingest::{IngestionEngine, JournalPolicy, MemoryImportStore, SpecRegistry};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let store = Arc::new(MemoryImportStore::new());
//! SpecRegistry::new(store.clone()).process_spec_files(Path::new("specs")).await?;
//!
//! let engine = IngestionEngine::new(store, JournalPolicy::PerFile)?;
//! let stats = engine.process_data_files(Path::new("data")).await?;
//! println!("{} rows loaded", stats.rows_processed);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod cli;
pub mod config;
pub mod db;
pub mod engine;
pub mod filename;
pub mod journal;
pub mod lock;
pub mod registry;
pub mod scan;
pub mod spec;
pub mod stats;
pub mod store;

pub use engine::{FileOutcome, FileReport, IngestError, IngestionEngine};
pub use filename::{DataFileIdentity, FilenameResolver, Resolution};
pub use journal::{ImportJournal, JournalError, JournalOpen, JournalPolicy};
pub use registry::{RegistryError, SpecRegistry};
pub use spec::{Spec, SpecColumn, SpecError};
pub use stats::RunStats;
pub use store::{ImportStore, MemoryImportStore, PgImportStore, StoreError};
