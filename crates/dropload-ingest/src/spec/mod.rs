//! Fixed-width column layouts
//!
//! A [`Spec`] is the ordered list of [`SpecColumn`]s describing one class of
//! data file. Column order defines offsets, so a spec is immutable once built:
//! [`Spec::new`] validates everything up front and derives the total row width.

pub mod codec;
pub mod source;

use dropload_common::Datatype;
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

pub use codec::{ColumnValue, RowError};
pub use source::{parse_spec_source, read_spec_file, SpecSourceError};

/// Prefix of every per-spec data table
pub const DATA_TABLE_PREFIX: &str = "import_data";

/// Longest accepted spec or column name.
///
/// Keeps `import_data_<name>` inside PostgreSQL's 63-byte identifier limit.
pub const MAX_IDENTIFIER_LEN: usize = 50;

/// Errors raised while constructing columns and specs
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("name '{0}' is invalid: must be 1-50 ASCII letters or digits")]
    InvalidName(String),

    #[error("width '{0}' is not an integer")]
    InvalidWidth(String),

    #[error("width '{0}' must be greater than zero")]
    NonPositiveWidth(String),

    #[error("datatype '{0}' is not one of TEXT, INTEGER, BOOLEAN")]
    InvalidDatatype(String),

    #[error("column '{0}' is declared more than once")]
    DuplicateColumn(String),

    #[error("spec '{0}' has no columns")]
    NoColumns(String),
}

/// Check an identifier against `[A-Za-z0-9]+`, full match
pub fn validate_identifier(name: &str) -> Result<(), SpecError> {
    if name.is_empty()
        || name.len() > MAX_IDENTIFIER_LEN
        || !name.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(SpecError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// One column of a fixed-width layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecColumn {
    name: String,
    width: u32,
    datatype: Datatype,
    nullable: bool,
}

impl SpecColumn {
    pub fn new(name: impl Into<String>, width: u32, datatype: Datatype) -> Result<Self, SpecError> {
        let name = name.into();
        validate_identifier(&name)?;
        if width == 0 {
            return Err(SpecError::NonPositiveWidth(width.to_string()));
        }
        Ok(Self {
            name,
            width,
            datatype,
            nullable: false,
        })
    }

    /// Build a column from its textual attributes
    ///
    /// Checks run in the order datatype, name, width, so the first reported
    /// problem is stable for a given row.
    pub fn parse(name: &str, width: &str, datatype: &str) -> Result<Self, SpecError> {
        let datatype: Datatype = datatype
            .parse()
            .map_err(|_| SpecError::InvalidDatatype(datatype.to_string()))?;
        validate_identifier(name)?;
        let width = parse_width(width)?;
        Self::new(name, width, datatype)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }
}

/// Widths follow the INTEGER rule (`"7"` and `"7.0"` are both 7) and must be positive.
fn parse_width(raw: &str) -> Result<u32, SpecError> {
    let value = codec::parse_integral(raw).ok_or_else(|| SpecError::InvalidWidth(raw.to_string()))?;
    if value <= 0 {
        return Err(SpecError::NonPositiveWidth(raw.to_string()));
    }
    u32::try_from(value).map_err(|_| SpecError::InvalidWidth(raw.to_string()))
}

/// A named, ordered fixed-width layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Spec {
    name: String,
    columns: Vec<SpecColumn>,
    total_width: usize,
}

impl Spec {
    pub fn new(name: impl Into<String>, columns: Vec<SpecColumn>) -> Result<Self, SpecError> {
        let name = name.into();
        validate_identifier(&name)?;

        if columns.is_empty() {
            return Err(SpecError::NoColumns(name));
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.name()) {
                return Err(SpecError::DuplicateColumn(column.name().to_string()));
            }
        }

        let total_width = columns.iter().map(|c| c.width() as usize).sum();

        Ok(Self {
            name,
            columns,
            total_width,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[SpecColumn] {
        &self.columns
    }

    /// Exact character length of every conforming row
    pub fn total_width(&self) -> usize {
        self.total_width
    }

    /// Name of the table holding this spec's rows
    pub fn data_table(&self) -> String {
        data_table_name(&self.name)
    }
}

pub fn data_table_name(spec_name: &str) -> String {
    format!("{DATA_TABLE_PREFIX}_{spec_name}")
}
