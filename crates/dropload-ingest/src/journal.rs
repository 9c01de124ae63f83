//! Import journal
//!
//! One entry per `(format, file timestamp)`. An entry is created `inprogress`
//! with zero rows the first time a file is seen, advanced as rows are
//! persisted, and finalized `complete` (at least one row) or `failed` (none).
//! A `complete` entry makes every later submission of the same file a no-op;
//! any other status is a resume point.

use chrono::{DateTime, Utc};
use dropload_common::{DroploadError, ImportStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::store::{ImportLogEntry, ImportStore, StoreError};

#[derive(Error, Debug)]
pub enum JournalError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Row counter of import log {log_id} cannot move by {delta}")]
    NegativeDelta { log_id: i64, delta: i64 },
}

/// When progress is written to the journal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JournalPolicy {
    /// Once per file, after the last row
    #[default]
    PerFile,
    /// After every persisted row
    PerRow,
}

impl JournalPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalPolicy::PerFile => "per-file",
            JournalPolicy::PerRow => "per-row",
        }
    }
}

impl std::fmt::Display for JournalPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JournalPolicy {
    type Err = DroploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "per-file" | "file" => Ok(JournalPolicy::PerFile),
            "per-row" | "row" => Ok(JournalPolicy::PerRow),
            _ => Err(DroploadError::parse("journal policy", s)),
        }
    }
}

/// Outcome of [`ImportJournal::open`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalOpen {
    /// First sighting of the file
    Created(ImportLogEntry),
    /// Seen before but not complete; continue after `rows_processed` rows
    Resumed(ImportLogEntry),
    AlreadyComplete(ImportLogEntry),
}

impl JournalOpen {
    pub fn entry(&self) -> &ImportLogEntry {
        match self {
            JournalOpen::Created(entry)
            | JournalOpen::Resumed(entry)
            | JournalOpen::AlreadyComplete(entry) => entry,
        }
    }
}

pub struct ImportJournal<S> {
    store: Arc<S>,
}

impl<S> Clone for ImportJournal<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ImportStore> ImportJournal<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Find or create the entry for a data file
    ///
    /// `file_checksum` is recorded on creation. When resuming, a stored
    /// checksum that differs from it is logged: the file changed since the
    /// interrupted run, and skipped rows may no longer be the ones persisted.
    #[tracing::instrument(skip(self, file_checksum))]
    pub async fn open(
        &self,
        format_id: i64,
        creation_date: DateTime<Utc>,
        file_checksum: Option<&str>,
    ) -> Result<JournalOpen, JournalError> {
        let (entry, created) = self
            .store
            .find_or_create_log(format_id, creation_date, file_checksum)
            .await?;

        if created {
            debug!(log_id = entry.id, "Journal entry created");
            return Ok(JournalOpen::Created(entry));
        }

        if entry.status.is_terminal_success() {
            info!(log_id = entry.id, rows = entry.rows_processed, "File already processed");
            return Ok(JournalOpen::AlreadyComplete(entry));
        }

        if let (Some(stored), Some(current)) = (entry.file_checksum.as_deref(), file_checksum) {
            if stored != current {
                warn!(
                    log_id = entry.id,
                    stored,
                    current,
                    "File changed since the interrupted run"
                );
            }
        }

        info!(
            log_id = entry.id,
            status = %entry.status,
            rows = entry.rows_processed,
            "Resuming import"
        );
        Ok(JournalOpen::Resumed(entry))
    }

    /// Add `delta` rows and optionally move to `status`, in one transaction
    pub async fn advance(
        &self,
        log_id: i64,
        delta: i64,
        status: Option<ImportStatus>,
    ) -> Result<ImportLogEntry, JournalError> {
        if delta < 0 {
            return Err(JournalError::NegativeDelta { log_id, delta });
        }
        Ok(self.store.advance_log(log_id, delta, status).await?)
    }

    /// Record the last `pending` rows and close the entry
    ///
    /// The status follows the entry's total: zero rows is `failed`, anything
    /// else `complete`.
    pub async fn finalize(
        &self,
        entry: &ImportLogEntry,
        pending: i64,
    ) -> Result<ImportLogEntry, JournalError> {
        let status = if entry.rows_processed + pending == 0 {
            ImportStatus::Failed
        } else {
            ImportStatus::Complete
        };
        self.advance(entry.id, pending, Some(status)).await
    }
}
