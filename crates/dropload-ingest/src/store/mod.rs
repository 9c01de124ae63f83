//! Persistence boundary for formats, journal entries and data rows
//!
//! Everything above this module talks to an [`ImportStore`]. Two
//! implementations exist: [`PgImportStore`] for PostgreSQL and
//! [`MemoryImportStore`] for tests and dry runs.
//!
//! Each trait method is one logical operation and is atomic on its own. No
//! method holds a transaction open across calls.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dropload_common::ImportStatus;
use thiserror::Error;

use crate::spec::{ColumnValue, Spec};

pub use memory::MemoryImportStore;
pub use postgres::PgImportStore;

/// Store operation errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("{0}")]
    NotFound(String),

    /// Persisted data violates an invariant (unknown tag, missing columns)
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Injected failure: {0}")]
    Injected(String),
}

impl StoreError {
    pub fn not_found(resource_type: &str, identifier: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{resource_type} '{identifier}' not found"))
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A persisted spec header (`import_format`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFormat {
    pub id: i64,
    pub name: String,
}

/// A persisted spec column (`import_format_column`)
///
/// `datatype` stays the raw tag; turning it back into a
/// [`Datatype`](dropload_common::Datatype) is the registry's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFormatColumn {
    pub id: i64,
    pub import_format_id: i64,
    pub position: i32,
    pub name: String,
    pub width: i64,
    pub datatype: String,
    pub nullable: bool,
}

/// A journal entry (`import_log`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportLogEntry {
    pub id: i64,
    pub import_format_id: i64,
    pub creation_date: DateTime<Utc>,
    pub status: ImportStatus,
    pub rows_processed: i64,
    pub file_checksum: Option<String>,
}

/// Result of [`ImportStore::insert_format`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(ImportFormat),
    AlreadyExists(ImportFormat),
}

impl InsertOutcome {
    pub fn format(&self) -> &ImportFormat {
        match self {
            InsertOutcome::Inserted(format) | InsertOutcome::AlreadyExists(format) => format,
        }
    }
}

#[async_trait]
pub trait ImportStore: Send + Sync {
    async fn find_format(&self, name: &str) -> StoreResult<Option<ImportFormat>>;

    /// All formats, oldest first
    async fn list_formats(&self) -> StoreResult<Vec<ImportFormat>>;

    /// Insert the format row, its columns and its data table in one unit
    ///
    /// An existing format of the same name is left untouched.
    async fn insert_format(&self, spec: &Spec) -> StoreResult<InsertOutcome>;

    /// Columns of a format in declared order
    async fn load_format_columns(&self, format_id: i64) -> StoreResult<Vec<ImportFormatColumn>>;

    /// Drop the data table, then remove columns, journal entries and the format row
    async fn delete_format(&self, format: &ImportFormat) -> StoreResult<()>;

    /// Atomic lookup-or-create on `(format_id, creation_date)`
    ///
    /// A new entry starts `inprogress` with zero rows. The flag is `true` when
    /// this call created the entry.
    async fn find_or_create_log(
        &self,
        format_id: i64,
        creation_date: DateTime<Utc>,
        file_checksum: Option<&str>,
    ) -> StoreResult<(ImportLogEntry, bool)>;

    /// Add `delta` to the row counter and optionally replace the status
    async fn advance_log(
        &self,
        log_id: i64,
        delta: i64,
        status: Option<ImportStatus>,
    ) -> StoreResult<ImportLogEntry>;

    /// Append one decoded row to the spec's data table
    async fn insert_row(&self, spec: &Spec, log_id: i64, values: &[ColumnValue]) -> StoreResult<()>;
}
