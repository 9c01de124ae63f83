//! Data file naming convention
//!
//! `<specName>_<YYYY-MM-DDThh:mm:ss.sssZ><optional label>.txt`, for example
//! `colors_2024-01-31T08:15:00.000Z_morning.txt`. The timestamp is part of the
//! file's identity; the label is cosmetic.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use regex::Regex;
use std::path::Path;

use crate::scan::is_hidden;

/// Extension of ingestible data files
pub const DATA_FILE_EXTENSION: &str = "txt";

/// Lenient shape match; the timestamp is parsed strictly afterwards
pub const DATA_FILE_PATTERN: &str =
    r"^([A-Za-z0-9]+)_(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z)(.*)\.txt$";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// What a data file name says about the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFileIdentity {
    pub spec_name: String,
    pub timestamp: DateTime<Utc>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Starts with `.`; never ingested
    Hidden,
    /// Outside the naming convention
    NoMatch,
    /// Right shape, but not a real instant (e.g. month 13)
    InvalidTimestamp { spec_name: String, raw: String },
    Resolved(DataFileIdentity),
}

#[derive(Debug, Clone)]
pub struct FilenameResolver {
    pattern: Regex,
}

impl FilenameResolver {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(DATA_FILE_PATTERN)?,
        })
    }

    pub fn resolve(&self, file_name: &str) -> Resolution {
        if is_hidden(file_name) {
            return Resolution::Hidden;
        }

        let Some(captures) = self.pattern.captures(file_name) else {
            return Resolution::NoMatch;
        };
        let spec_name = captures[1].to_string();
        let raw = &captures[2];

        let Some(timestamp) = parse_timestamp(raw) else {
            return Resolution::InvalidTimestamp {
                spec_name,
                raw: raw.to_string(),
            };
        };

        let label = Some(&captures[3])
            .filter(|label| !label.is_empty())
            .map(str::to_string);

        Resolution::Resolved(DataFileIdentity {
            spec_name,
            timestamp,
            label,
        })
    }

    /// Resolve the final component of `path`
    pub fn resolve_path(&self, path: &Path) -> Resolution {
        match path.file_name().and_then(|name| name.to_str()) {
            Some(name) => self.resolve(name),
            None => Resolution::NoMatch,
        }
    }
}

/// Strict `YYYY-MM-DDThh:mm:ss.sssZ` parse, read as UTC
///
/// Second `60` is rejected: chrono reads it as a leap second, which would
/// collide with the following second once stored.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok()?;
    if naive.nanosecond() >= 1_000_000_000 {
        return None;
    }
    Some(naive.and_utc())
}
