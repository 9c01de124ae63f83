//! Domain enums persisted by the store and shared by every layer
//!
//! Both enums are closed: every use site matches exhaustively, and textual
//! tags coming from spec sources or the database are rejected at parse time.

use serde::{Deserialize, Serialize};

use crate::error::DroploadError;

/// Declared datatype of a fixed-width column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Datatype {
    Text,
    Integer,
    Boolean,
}

impl Datatype {
    /// Tag used in spec sources and in `import_format_column.datatype`
    pub fn as_str(&self) -> &'static str {
        match self {
            Datatype::Text => "TEXT",
            Datatype::Integer => "INTEGER",
            Datatype::Boolean => "BOOLEAN",
        }
    }

    /// PostgreSQL column type used for this datatype in a spec's data table
    pub fn sql_type(&self) -> &'static str {
        match self {
            Datatype::Text => "TEXT",
            Datatype::Integer => "BIGINT",
            Datatype::Boolean => "BOOLEAN",
        }
    }
}

impl std::fmt::Display for Datatype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Datatype {
    type Err = DroploadError;

    /// Tags are case-sensitive: `TEXT`, `INTEGER`, `BOOLEAN`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TEXT" => Ok(Datatype::Text),
            "INTEGER" => Ok(Datatype::Integer),
            "BOOLEAN" => Ok(Datatype::Boolean),
            other => Err(DroploadError::parse("datatype", other)),
        }
    }
}

/// Lifecycle status of an import journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    New,
    InProgress,
    Complete,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::New => "new",
            ImportStatus::InProgress => "inprogress",
            ImportStatus::Complete => "complete",
            ImportStatus::Failed => "failed",
        }
    }

    /// Whether a file with this status must be skipped on later runs
    pub fn is_terminal_success(&self) -> bool {
        matches!(self, ImportStatus::Complete)
    }
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImportStatus {
    type Err = DroploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(ImportStatus::New),
            "inprogress" => Ok(ImportStatus::InProgress),
            "complete" => Ok(ImportStatus::Complete),
            "failed" => Ok(ImportStatus::Failed),
            other => Err(DroploadError::parse("import status", other)),
        }
    }
}
