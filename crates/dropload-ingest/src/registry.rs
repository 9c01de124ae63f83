//! Spec lifecycle: load from source, persist, reload, delete
//!
//! The registry is the only component that creates or removes formats. A
//! format, once persisted, is never updated: persisting a spec whose name is
//! already taken logs a warning and keeps the stored layout.

use dropload_common::Datatype;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::scan::scan_dir;
use crate::spec::{read_spec_file, Spec, SpecColumn, SpecSourceError};
use crate::stats::RunStats;
use crate::store::{ImportFormat, ImportFormatColumn, ImportStore, InsertOutcome, StoreError};

/// Extension of spec source files
pub const SPEC_FILE_EXTENSION: &str = "csv";

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Source(#[from] SpecSourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to list spec directory {dir}: {source}")]
    Scan {
        dir: String,
        source: std::io::Error,
    },
}

pub struct SpecRegistry<S> {
    store: Arc<S>,
}

impl<S> Clone for SpecRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ImportStore> SpecRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Read and validate a spec source without persisting it
    pub fn load_spec_from_source(&self, path: &Path) -> Result<Spec, SpecSourceError> {
        read_spec_file(path)
    }

    /// Persist a spec, or do nothing if its name is taken
    ///
    /// Either way the returned format is the one now stored under that name.
    #[tracing::instrument(skip(self, spec), fields(spec = %spec.name()))]
    pub async fn persist(&self, spec: &Spec) -> Result<ImportFormat, StoreError> {
        match self.store.insert_format(spec).await? {
            InsertOutcome::Inserted(format) => {
                info!(format_id = format.id, columns = spec.columns().len(), "Spec persisted");
                Ok(format)
            },
            InsertOutcome::AlreadyExists(format) => {
                warn!(
                    format_id = format.id,
                    "Spec already exists; updating an existing spec is not supported"
                );
                Ok(format)
            },
        }
    }

    /// Load, validate and persist one spec source, logging any failure
    pub async fn process_spec_file(&self, path: &Path) -> bool {
        let start = Instant::now();
        let result = self.load_and_persist(path).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(format) => {
                info!(file = %path.display(), format_id = format.id, elapsed_ms, "Processed spec file");
                true
            },
            Err(err) => {
                error!(file = %path.display(), error = %err, elapsed_ms, "Failed to process spec file");
                false
            },
        }
    }

    async fn load_and_persist(&self, path: &Path) -> Result<ImportFormat, RegistryError> {
        let spec = self.load_spec_from_source(path)?;
        Ok(self.persist(&spec).await?)
    }

    /// Process every spec source in `dir`
    ///
    /// Only an unreadable directory is an error; individual files fail on
    /// their own and are counted.
    pub async fn process_spec_files(&self, dir: &Path) -> Result<RunStats, RegistryError> {
        let files = scan_dir(dir, SPEC_FILE_EXTENSION).map_err(|source| RegistryError::Scan {
            dir: dir.display().to_string(),
            source,
        })?;

        let mut stats = RunStats::new();
        stats.files_ready = files.len() as u64;
        info!(dir = %dir.display(), ready = stats.files_ready, "Processing spec files");

        for path in &files {
            if self.process_spec_file(path).await {
                stats.inc_processed();
            } else {
                stats.inc_failed();
            }
        }

        stats.complete();
        stats.log_summary("specs");
        Ok(stats)
    }

    /// Rebuild a persisted spec; `None` when no format has this name
    pub async fn load_by_name(&self, name: &str) -> Result<Option<Spec>, StoreError> {
        Ok(self.load_with_format(name).await?.map(|(_, spec)| spec))
    }

    /// Like [`load_by_name`](Self::load_by_name), also returning the stored
    /// format record the spec was rebuilt from
    pub async fn load_with_format(
        &self,
        name: &str,
    ) -> Result<Option<(ImportFormat, Spec)>, StoreError> {
        let Some(format) = self.store.find_format(name).await? else {
            return Ok(None);
        };

        let rows = self.store.load_format_columns(format.id).await?;
        if rows.is_empty() {
            return Err(StoreError::corrupt(format!("spec '{name}' has no columns")));
        }

        let columns = rows
            .iter()
            .map(|row| column_from_record(name, row))
            .collect::<Result<Vec<_>, _>>()?;

        let spec = Spec::new(format.name.clone(), columns)
            .map_err(|e| StoreError::corrupt(format!("spec '{name}': {e}")))?;
        Ok(Some((format, spec)))
    }

    /// Remove a spec with its columns, journal entries and data table
    ///
    /// Returns `false` when no spec has this name.
    #[tracing::instrument(skip(self))]
    pub async fn delete_spec(&self, name: &str) -> Result<bool, StoreError> {
        let Some(format) = self.store.find_format(name).await? else {
            warn!("No spec to delete");
            return Ok(false);
        };
        self.store.delete_format(&format).await?;
        info!(format_id = format.id, "Spec deleted");
        Ok(true)
    }

    /// Delete every persisted spec, returning how many were removed
    pub async fn delete_all_specs(&self) -> Result<usize, StoreError> {
        let formats = self.store.list_formats().await?;
        for format in &formats {
            self.store.delete_format(format).await?;
            info!(spec = %format.name, format_id = format.id, "Spec deleted");
        }
        Ok(formats.len())
    }
}

fn column_from_record(spec: &str, row: &ImportFormatColumn) -> Result<SpecColumn, StoreError> {
    let corrupt = |what: String| StoreError::corrupt(format!("spec '{spec}' column '{}': {what}", row.name));

    let datatype: Datatype = row.datatype.parse().map_err(|e| corrupt(format!("{e}")))?;
    let width = u32::try_from(row.width).map_err(|_| corrupt(format!("bad width {}", row.width)))?;
    SpecColumn::new(row.name.clone(), width, datatype).map_err(|e| corrupt(e.to_string()))
}
