//! Spec source files
//!
//! A spec source is a CSV file whose header names exactly the fields
//! `column name`, `width` and `datatype` (any order), followed by one row per
//! column. The file stem is the spec name: `colors.csv` declares spec `colors`.

use std::io::Read;
use std::path::Path;
use thiserror::Error;

use super::{Spec, SpecColumn, SpecError};

pub const COLUMN_NAME_FIELD: &str = "column name";
pub const WIDTH_FIELD: &str = "width";
pub const DATATYPE_FIELD: &str = "datatype";

const FIELD_COUNT: usize = 3;

/// Why a spec source was rejected
#[derive(Debug, Error)]
pub enum SpecSourceError {
    #[error("Spec file {source_name} is missing the header row")]
    MissingHeader { source_name: String },

    #[error("Spec file {source_name} is empty")]
    Empty { source_name: String },

    #[error("Spec file row {row} has too many columns")]
    TooManyFields { row: u64 },

    #[error("Spec file row {row} is missing one or more columns")]
    MissingFields { row: u64 },

    #[error("Spec file row {row} is invalid: {source}")]
    Column { row: u64, source: SpecError },

    #[error("Spec file {source_name} is invalid: {source}")]
    Spec { source_name: String, source: SpecError },

    #[error("Spec file path {0} has no usable file name")]
    Path(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

struct FieldPositions {
    name: usize,
    width: usize,
    datatype: usize,
}

impl FieldPositions {
    /// Locate the three fields; `None` unless the header is exactly that set
    fn from_header(header: &csv::StringRecord) -> Option<Self> {
        if header.len() != FIELD_COUNT {
            return None;
        }
        let position = |field: &str| header.iter().position(|h| h.trim() == field);
        Some(Self {
            name: position(COLUMN_NAME_FIELD)?,
            width: position(WIDTH_FIELD)?,
            datatype: position(DATATYPE_FIELD)?,
        })
    }
}

/// Parse a spec named `spec_name` from CSV content
///
/// The first failing row aborts the whole source.
pub fn parse_spec_source<R: Read>(spec_name: &str, reader: R) -> Result<Spec, SpecSourceError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let header = reader.headers()?.clone();
    let positions =
        FieldPositions::from_header(&header).ok_or_else(|| SpecSourceError::MissingHeader {
            source_name: spec_name.to_string(),
        })?;

    let mut columns = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let row = record
            .position()
            .map_or(index as u64 + 2, |position| position.line());

        if record.len() > FIELD_COUNT {
            return Err(SpecSourceError::TooManyFields { row });
        }

        let field = |position: usize| {
            record
                .get(position)
                .ok_or(SpecSourceError::MissingFields { row })
        };
        let column = SpecColumn::parse(
            field(positions.name)?,
            field(positions.width)?,
            field(positions.datatype)?,
        )
        .map_err(|source| SpecSourceError::Column { row, source })?;

        columns.push(column);
    }

    if columns.is_empty() {
        return Err(SpecSourceError::Empty {
            source_name: spec_name.to_string(),
        });
    }

    Spec::new(spec_name, columns).map_err(|source| SpecSourceError::Spec {
        source_name: spec_name.to_string(),
        source,
    })
}

/// Read a spec from a file, naming it after the file stem
pub fn read_spec_file(path: impl AsRef<Path>) -> Result<Spec, SpecSourceError> {
    let path = path.as_ref();
    let spec_name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| SpecSourceError::Path(path.display().to_string()))?;

    let file = std::fs::File::open(path)?;
    parse_spec_source(spec_name, file)
}
