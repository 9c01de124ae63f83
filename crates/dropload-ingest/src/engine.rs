//! Data file ingestion
//!
//! For each data file: resolve its name, load its spec, open or resume its
//! journal entry, then stream the remaining lines through the row codec into
//! the spec's data table. Bad rows are logged and counted, never fatal, and no
//! failure inside one file stops the sweep.

use dropload_common::checksum::file_sha256;
use dropload_common::{DroploadError, ImportStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::filename::{FilenameResolver, Resolution, DATA_FILE_EXTENSION};
use crate::journal::{ImportJournal, JournalError, JournalOpen, JournalPolicy};
use crate::registry::SpecRegistry;
use crate::scan::scan_dir;
use crate::spec::Spec;
use crate::stats::RunStats;
use crate::store::{ImportLogEntry, ImportStore, StoreError};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("No spec named '{0}' has been loaded")]
    UnknownSpec(String),

    #[error("Timestamp '{raw}' in file name is not a valid instant")]
    InvalidTimestamp { raw: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error("Failed to checksum data file: {0}")]
    Checksum(#[from] DroploadError),

    #[error("Checksum task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to list data directory {dir}: {source}")]
    Scan {
        dir: String,
        source: std::io::Error,
    },
}

/// How one data file ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Hidden, or outside the naming convention
    Ignored,
    /// The journal already has this file as complete
    AlreadyComplete,
    /// Lines were streamed and the entry finalized
    Finished(FileReport),
}

/// Counters for one pass over a data file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub log_id: i64,
    /// Status the entry was finalized to
    pub status: ImportStatus,
    /// Lines skipped because an earlier run already counted them
    pub rows_skipped: u64,
    /// Rows persisted during this pass
    pub rows_persisted: u64,
    /// Rows rejected by validation or by the store during this pass
    pub rows_failed: u64,
    /// Total rows recorded on the entry after this pass
    pub rows_processed: i64,
}

pub struct IngestionEngine<S> {
    store: Arc<S>,
    registry: SpecRegistry<S>,
    journal: ImportJournal<S>,
    resolver: FilenameResolver,
    policy: JournalPolicy,
}

impl<S: ImportStore> IngestionEngine<S> {
    pub fn new(store: Arc<S>, policy: JournalPolicy) -> Result<Self, regex::Error> {
        Ok(Self {
            registry: SpecRegistry::new(Arc::clone(&store)),
            journal: ImportJournal::new(Arc::clone(&store)),
            resolver: FilenameResolver::new()?,
            store,
            policy,
        })
    }

    /// Process every data file in `dir`, in file name order
    ///
    /// Only an unreadable directory is an error.
    pub async fn process_data_files(&self, dir: &Path) -> Result<RunStats, IngestError> {
        let files = scan_dir(dir, DATA_FILE_EXTENSION).map_err(|source| IngestError::Scan {
            dir: dir.display().to_string(),
            source,
        })?;

        let mut stats = RunStats::new();
        stats.files_ready = files.len() as u64;
        info!(dir = %dir.display(), ready = stats.files_ready, policy = %self.policy, "Processing data files");

        for path in &files {
            let start = Instant::now();
            let result = self.process_file(path).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(FileOutcome::Ignored | FileOutcome::AlreadyComplete) => stats.inc_skipped(),
                Ok(FileOutcome::Finished(report)) => {
                    stats.add_rows(report.rows_persisted, report.rows_failed);
                    if report.status == ImportStatus::Complete {
                        info!(
                            file = %path.display(),
                            rows = report.rows_processed,
                            failed = report.rows_failed,
                            elapsed_ms,
                            "Processed data file"
                        );
                        stats.inc_processed();
                    } else {
                        error!(file = %path.display(), elapsed_ms, "Data file produced no rows");
                        stats.inc_failed();
                    }
                },
                Err(err) => {
                    error!(file = %path.display(), error = %err, elapsed_ms, "Failed to process data file");
                    stats.inc_failed();
                },
            }
        }

        stats.complete();
        stats.log_summary("data");
        Ok(stats)
    }

    /// Resolve, journal and ingest a single data file
    #[tracing::instrument(skip(self, path), fields(file = %path.display()))]
    pub async fn process_file(&self, path: &Path) -> Result<FileOutcome, IngestError> {
        let identity = match self.resolver.resolve_path(path) {
            Resolution::Resolved(identity) => identity,
            Resolution::Hidden => {
                info!("Ignoring hidden file");
                return Ok(FileOutcome::Ignored);
            },
            Resolution::NoMatch => {
                debug!("File name does not follow the data file convention");
                return Ok(FileOutcome::Ignored);
            },
            Resolution::InvalidTimestamp { raw, .. } => {
                return Err(IngestError::InvalidTimestamp { raw });
            },
        };

        let (format, spec) = self
            .registry
            .load_with_format(&identity.spec_name)
            .await?
            .ok_or_else(|| IngestError::UnknownSpec(identity.spec_name.clone()))?;

        let checksum = checksum_file(path.to_path_buf()).await?;
        let entry = match self
            .journal
            .open(format.id, identity.timestamp, Some(&checksum))
            .await?
        {
            JournalOpen::AlreadyComplete(_) => return Ok(FileOutcome::AlreadyComplete),
            JournalOpen::Created(entry) | JournalOpen::Resumed(entry) => entry,
        };

        let report = self.process_datafile(&spec, entry, path).await?;
        Ok(FileOutcome::Finished(report))
    }

    /// Stream a data file into the spec's table, continuing after the rows the
    /// entry already counts
    pub async fn process_datafile(
        &self,
        spec: &Spec,
        mut entry: ImportLogEntry,
        path: &Path,
    ) -> Result<FileReport, IngestError> {
        let skip = u64::try_from(entry.rows_processed).unwrap_or(0);
        let mut lines = BufReader::new(File::open(path).await?).split(b'\n');

        let mut line_number = 0u64;
        let mut rows_skipped = 0u64;
        let mut rows_persisted = 0u64;
        let mut rows_failed = 0u64;
        let mut pending = 0i64;

        loop {
            let raw = match lines.next_segment().await {
                Ok(Some(raw)) => raw,
                Ok(None) => break,
                Err(err) => {
                    // Keep what was persisted so a rerun resumes after it
                    if pending > 0 {
                        self.journal.advance(entry.id, pending, None).await?;
                    }
                    return Err(err.into());
                },
            };
            line_number += 1;

            if line_number <= skip {
                rows_skipped += 1;
                continue;
            }

            let line = match decode_line(raw) {
                Ok(line) => line,
                Err(err) => {
                    error!(line = line_number, error = %err, "Row is not valid UTF-8");
                    rows_failed += 1;
                    continue;
                },
            };

            let values = match spec.decode_row(&line) {
                Ok(values) => values,
                Err(err) => {
                    error!(line = line_number, error = %err, "Row failed validation");
                    rows_failed += 1;
                    continue;
                },
            };

            if let Err(err) = self.store.insert_row(spec, entry.id, &values).await {
                error!(line = line_number, error = %err, "Failed to persist row");
                rows_failed += 1;
                continue;
            }
            rows_persisted += 1;

            match self.policy {
                JournalPolicy::PerRow => entry = self.journal.advance(entry.id, 1, None).await?,
                JournalPolicy::PerFile => pending += 1,
            }
        }

        if rows_skipped < skip {
            warn!(
                expected = skip,
                found = rows_skipped,
                "File has fewer lines than the journal already counts"
            );
        }

        let entry = self.journal.finalize(&entry, pending).await?;

        Ok(FileReport {
            log_id: entry.id,
            status: entry.status,
            rows_skipped,
            rows_persisted,
            rows_failed,
            rows_processed: entry.rows_processed,
        })
    }
}

/// SHA-256 of the data file, off the async workers
async fn checksum_file(path: PathBuf) -> Result<String, IngestError> {
    Ok(tokio::task::spawn_blocking(move || file_sha256(path)).await??)
}

/// One line without its terminator; a trailing `\r` is dropped with the `\n`
fn decode_line(mut raw: Vec<u8>) -> Result<String, std::string::FromUtf8Error> {
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }
    String::from_utf8(raw)
}
