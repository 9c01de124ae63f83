//! Error types shared across the dropload crates

use thiserror::Error;

/// Result type alias for dropload operations
pub type Result<T> = std::result::Result<T, DroploadError>;

/// Main error type for dropload
#[derive(Error, Debug)]
pub enum DroploadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown {kind} '{value}'")]
    Parse { kind: &'static str, value: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DroploadError {
    /// Create a parse error for a value that names no known variant of `kind`
    pub fn parse(kind: &'static str, value: impl Into<String>) -> Self {
        Self::Parse {
            kind,
            value: value.into(),
        }
    }
}
