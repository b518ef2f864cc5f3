//! Error taxonomy for the CPI pipeline.
//!
//! Only [`ConfigError`] aborts a run. [`ParseError`] is recorded per reading and
//! the affected metric becomes missing; [`IntakeError`] is recorded per record.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for library operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for operations that can fail as a whole.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One raw value that matched no recognized numeric pattern.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("empty value")]
    Empty,

    #[error("unrecognized numeric pattern: {0:?}")]
    Unrecognized(String),

    #[error("negative value: {0}")]
    Negative(f64),

    #[error("non-finite value")]
    NotFinite,

    #[error("value out of range: {0:?}")]
    OutOfRange(String),
}

impl ParseError {
    /// Stable snake_case code for reports
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::Empty => "empty",
            ParseError::Unrecognized(_) => "unrecognized",
            ParseError::Negative(_) => "negative",
            ParseError::NotFinite => "not_finite",
            ParseError::OutOfRange(_) => "out_of_range",
        }
    }
}

/// Invalid run configuration. Fatal: raised before any scoring happens.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{source_name} weight must be finite and >= 0 (got {value})")]
    InvalidWeight { source_name: &'static str, value: f64 },

    #[error("weights must not both be zero")]
    ZeroWeights,

    #[error("roster entry {0:?} has no usable characters for an artist key")]
    EmptyRosterKey(String),

    #[error("roster entries {first:?} and {second:?} map to the same artist key {key:?}")]
    DuplicateRosterKey {
        first: String,
        second: String,
        key: String,
    },

    #[error("failed to read config {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// A raw record that failed shape validation at intake.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntakeError {
    #[error("record #{index} is malformed: {message}")]
    Malformed { index: usize, message: String },

    #[error("record #{index} has an empty artist name")]
    EmptyArtist { index: usize },

    #[error("record #{index}: artist {name:?} has no usable characters for an artist key")]
    EmptyKey { index: usize, name: String },

    #[error("record #{index}: artist {name:?} is not in the roster{}", closest_hint(.closest))]
    NotInRoster {
        index: usize,
        name: String,
        closest: Option<String>,
    },
}

fn closest_hint(closest: &Option<String>) -> String {
    match closest {
        Some(c) => format!(" (closest: {:?})", c),
        None => String::new(),
    }
}

/// Failure persisting the ranked table.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("unsafe output path: {0}")]
    UnsafeOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
