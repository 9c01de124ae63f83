//! Shared fixtures for ingester integration tests
//!
//! Each [`Fixture`] owns a temporary `specs/` and `data/` directory pair and an
//! in-memory store, so tests never touch a real database.

#![allow(dead_code, clippy::unwrap_used)]

use dropload_ingest::{IngestionEngine, JournalPolicy, MemoryImportStore, SpecRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// `color:7:TEXT` + `flag:1:BOOLEAN`, total width 8
pub const COLOR_SPEC: &str = "column name,width,datatype\ncolor,7,TEXT\nflag,1,BOOLEAN\n";

pub const STAMP: &str = "2024-01-01T00:00:00.000Z";

pub struct Fixture {
    _root: TempDir,
    pub spec_dir: PathBuf,
    pub data_dir: PathBuf,
    pub store: Arc<MemoryImportStore>,
}

impl Fixture {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let spec_dir = root.path().join("specs");
        let data_dir = root.path().join("data");
        std::fs::create_dir(&spec_dir).unwrap();
        std::fs::create_dir(&data_dir).unwrap();

        Self {
            _root: root,
            spec_dir,
            data_dir,
            store: Arc::new(MemoryImportStore::new()),
        }
    }

    /// A fixture with the color spec already persisted
    pub async fn with_color_spec() -> Self {
        let fixture = Self::new();
        fixture.write_spec("colors", COLOR_SPEC);
        let stats = fixture.registry().process_spec_files(&fixture.spec_dir).await.unwrap();
        assert_eq!(stats.files_processed, 1);
        fixture
    }

    pub fn registry(&self) -> SpecRegistry<MemoryImportStore> {
        SpecRegistry::new(Arc::clone(&self.store))
    }

    pub fn engine(&self, policy: JournalPolicy) -> IngestionEngine<MemoryImportStore> {
        IngestionEngine::new(Arc::clone(&self.store), policy).unwrap()
    }

    pub fn write_spec(&self, name: &str, content: &str) -> PathBuf {
        write(&self.spec_dir, &format!("{name}.csv"), content)
    }

    /// Write a data file; rows are joined with newlines
    pub fn write_data(&self, file_name: &str, rows: &[&str]) -> PathBuf {
        let mut content = rows.join("\n");
        content.push('\n');
        write(&self.data_dir, file_name, &content)
    }

    /// Write a data file byte for byte
    pub fn write_data_bytes(&self, file_name: &str, content: &[u8]) -> PathBuf {
        let path = self.data_dir.join(file_name);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn color_rows(&self) -> usize {
        self.store
            .rows("import_data_colors")
            .map_or(0, |rows| rows.len())
    }
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

pub fn color_file() -> String {
    format!("colors_{STAMP}.txt")
}
