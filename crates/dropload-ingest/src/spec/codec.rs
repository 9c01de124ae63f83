//! Row splitting and datatype validation
//!
//! Rows are cut at cumulative offsets derived from the column widths, never by
//! scanning for delimiters. Widths count characters, so multi-byte text never
//! splits inside a code point.

use dropload_common::Datatype;
use thiserror::Error;

use super::{Spec, SpecColumn};

/// Why a row was rejected
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("expected width is {expected}, but row contains {actual} characters")]
    Width { expected: usize, actual: usize },

    #[error("value '{value}' does not match {datatype} column '{column}'")]
    Column {
        column: String,
        datatype: Datatype,
        value: String,
    },
}

/// A validated column value, typed by its declared datatype
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
}

/// Parse a number whose integer truncation equals its value
///
/// Accepts surrounding whitespace and a superfluous fractional zero (`"42.0"`),
/// rejects fractions, non-numbers and values outside the `i64` range.
pub fn parse_integral(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }

    let value: f64 = trimmed.parse().ok()?;
    // i64::MAX is not representable as f64; the upper bound is 2^63, exclusive.
    let in_range = value >= i64::MIN as f64 && value < 9.223_372_036_854_775_808e18;
    if !value.is_finite() || value.fract() != 0.0 || !in_range {
        return None;
    }
    Some(value as i64)
}

impl SpecColumn {
    /// Decode one slice against this column's datatype
    pub fn decode(&self, slice: &str) -> Result<ColumnValue, RowError> {
        let value = match self.datatype() {
            Datatype::Text => Some(ColumnValue::Text(slice.to_string())),
            Datatype::Integer => parse_integral(slice).map(ColumnValue::Integer),
            Datatype::Boolean => match slice.trim() {
                "0" => Some(ColumnValue::Boolean(false)),
                "1" => Some(ColumnValue::Boolean(true)),
                _ => None,
            },
        };

        value.ok_or_else(|| RowError::Column {
            column: self.name().to_string(),
            datatype: self.datatype(),
            value: slice.to_string(),
        })
    }

    pub fn validate(&self, slice: &str) -> bool {
        self.decode(slice).is_ok()
    }
}

impl Spec {
    /// Cut a row into one slice per column, in declared order
    ///
    /// Short rows yield short or empty trailing slices; length is checked by
    /// [`Spec::decode_row`], not here.
    pub fn split_row<'a>(&self, row: &'a str) -> Vec<&'a str> {
        let mut slices = Vec::with_capacity(self.columns().len());
        let mut rest = row;

        for column in self.columns() {
            let end = rest
                .char_indices()
                .nth(column.width() as usize)
                .map_or(rest.len(), |(offset, _)| offset);
            let (slice, tail) = rest.split_at(end);
            slices.push(slice);
            rest = tail;
        }

        slices
    }

    /// Check the row width, then decode every column
    pub fn decode_row(&self, row: &str) -> Result<Vec<ColumnValue>, RowError> {
        let actual = row.chars().count();
        if actual != self.total_width() {
            return Err(RowError::Width {
                expected: self.total_width(),
                actual,
            });
        }

        self.columns()
            .iter()
            .zip(self.split_row(row))
            .map(|(column, slice)| column.decode(slice))
            .collect()
    }

    /// Boolean form of [`Spec::decode_row`]; logs the reason on failure
    pub fn validate_row(&self, row: &str) -> bool {
        match self.decode_row(row) {
            Ok(_) => true,
            Err(err) => {
                tracing::error!(spec = %self.name(), error = %err, "Error validating row");
                false
            },
        }
    }
}
