//! In-memory [`ImportStore`]
//!
//! Behaves like the PostgreSQL store for every operation the ingester uses and
//! adds hooks to inject failures and inspect what was written. Every operation
//! takes the state lock once, so each is atomic like its SQL counterpart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dropload_common::ImportStatus;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{
    ImportFormat, ImportFormatColumn, ImportLogEntry, ImportStore, InsertOutcome, StoreError,
    StoreResult,
};
use crate::spec::{data_table_name, ColumnValue, Spec};

/// One row of a data table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub import_log_id: i64,
    pub values: Vec<ColumnValue>,
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    formats: Vec<ImportFormat>,
    columns: Vec<ImportFormatColumn>,
    logs: Vec<ImportLogEntry>,
    tables: HashMap<String, Vec<StoredRow>>,
    failing_row_inserts: usize,
    fail_format_inserts: bool,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
pub struct MemoryImportStore {
    state: Mutex<State>,
}

impl MemoryImportStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `count` row inserts fail
    pub fn fail_next_row_inserts(&self, count: usize) {
        self.state().failing_row_inserts = count;
    }

    /// Make every format insert fail until reset
    pub fn fail_format_inserts(&self, fail: bool) {
        self.state().fail_format_inserts = fail;
    }

    /// Rows of a data table, `None` when the table does not exist
    pub fn rows(&self, table: &str) -> Option<Vec<StoredRow>> {
        self.state().tables.get(table).cloned()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.state().tables.contains_key(table)
    }

    /// Every journal entry, in creation order
    pub fn logs(&self) -> Vec<ImportLogEntry> {
        self.state().logs.clone()
    }

    /// Replace the persisted columns of a format, bypassing validation
    pub fn replace_columns(&self, format_id: i64, columns: Vec<ImportFormatColumn>) {
        let mut state = self.state();
        state.columns.retain(|c| c.import_format_id != format_id);
        state.columns.extend(columns);
    }
}

#[async_trait]
impl ImportStore for MemoryImportStore {
    async fn find_format(&self, name: &str) -> StoreResult<Option<ImportFormat>> {
        Ok(self.state().formats.iter().find(|f| f.name == name).cloned())
    }

    async fn list_formats(&self) -> StoreResult<Vec<ImportFormat>> {
        Ok(self.state().formats.clone())
    }

    async fn insert_format(&self, spec: &Spec) -> StoreResult<InsertOutcome> {
        let mut state = self.state();

        if let Some(existing) = state.formats.iter().find(|f| f.name == spec.name()) {
            return Ok(InsertOutcome::AlreadyExists(existing.clone()));
        }
        if state.fail_format_inserts {
            return Err(StoreError::Injected(format!("insert format '{}'", spec.name())));
        }

        let format = ImportFormat {
            id: state.next_id(),
            name: spec.name().to_string(),
        };
        for (position, column) in spec.columns().iter().enumerate() {
            let id = state.next_id();
            state.columns.push(ImportFormatColumn {
                id,
                import_format_id: format.id,
                position: position as i32,
                name: column.name().to_string(),
                width: i64::from(column.width()),
                datatype: column.datatype().as_str().to_string(),
                nullable: column.nullable(),
            });
        }
        state.tables.entry(spec.data_table()).or_default();
        state.formats.push(format.clone());

        Ok(InsertOutcome::Inserted(format))
    }

    async fn load_format_columns(&self, format_id: i64) -> StoreResult<Vec<ImportFormatColumn>> {
        let mut columns: Vec<_> = self
            .state()
            .columns
            .iter()
            .filter(|c| c.import_format_id == format_id)
            .cloned()
            .collect();
        columns.sort_by_key(|c| c.position);
        Ok(columns)
    }

    async fn delete_format(&self, format: &ImportFormat) -> StoreResult<()> {
        let mut state = self.state();
        state.tables.remove(&data_table_name(&format.name));
        state.columns.retain(|c| c.import_format_id != format.id);
        state.logs.retain(|l| l.import_format_id != format.id);
        state.formats.retain(|f| f.id != format.id);
        Ok(())
    }

    async fn find_or_create_log(
        &self,
        format_id: i64,
        creation_date: DateTime<Utc>,
        file_checksum: Option<&str>,
    ) -> StoreResult<(ImportLogEntry, bool)> {
        let mut state = self.state();

        if let Some(existing) = state
            .logs
            .iter()
            .find(|l| l.import_format_id == format_id && l.creation_date == creation_date)
        {
            return Ok((existing.clone(), false));
        }
        if !state.formats.iter().any(|f| f.id == format_id) {
            return Err(StoreError::not_found("import format", format_id));
        }

        let entry = ImportLogEntry {
            id: state.next_id(),
            import_format_id: format_id,
            creation_date,
            status: ImportStatus::InProgress,
            rows_processed: 0,
            file_checksum: file_checksum.map(str::to_string),
        };
        state.logs.push(entry.clone());
        Ok((entry, true))
    }

    async fn advance_log(
        &self,
        log_id: i64,
        delta: i64,
        status: Option<ImportStatus>,
    ) -> StoreResult<ImportLogEntry> {
        let mut state = self.state();
        let entry = state
            .logs
            .iter_mut()
            .find(|l| l.id == log_id)
            .ok_or_else(|| StoreError::not_found("import log", log_id))?;

        entry.rows_processed += delta;
        if let Some(status) = status {
            entry.status = status;
        }
        Ok(entry.clone())
    }

    async fn insert_row(&self, spec: &Spec, log_id: i64, values: &[ColumnValue]) -> StoreResult<()> {
        let mut state = self.state();

        if state.failing_row_inserts > 0 {
            state.failing_row_inserts -= 1;
            return Err(StoreError::Injected(format!("insert into '{}'", spec.data_table())));
        }
        if values.len() != spec.columns().len() {
            return Err(StoreError::corrupt(format!(
                "row has {} values, table '{}' has {} columns",
                values.len(),
                spec.data_table(),
                spec.columns().len()
            )));
        }
        if !state.logs.iter().any(|l| l.id == log_id) {
            return Err(StoreError::not_found("import log", log_id));
        }

        let table = state
            .tables
            .get_mut(&spec.data_table())
            .ok_or_else(|| StoreError::not_found("table", spec.data_table()))?;
        table.push(StoredRow {
            import_log_id: log_id,
            values: values.to_vec(),
        });
        Ok(())
    }
}
