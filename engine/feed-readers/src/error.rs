//! Error types for feed readers

use std::path::PathBuf;
use thiserror::Error;

/// A feed could not be fetched or read at all
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("source {source_id} returned an empty payload")]
    Empty { source_id: String },

    #[error("source {source_id} is not valid UTF-8: {error}")]
    Encoding { source_id: String, error: std::str::Utf8Error },

    #[error("source {source_id} has an unreadable header: {error}")]
    Header { source_id: String, error: csv::Error },

    #[error("source {source_id} is missing required column '{column}'")]
    MissingColumn { source_id: String, column: String },

    #[error("source {source_id} is not valid JSON: {error}")]
    Json { source_id: String, error: serde_json::Error },

    #[error("source {source_id} has an unexpected shape: {reason}")]
    Shape { source_id: String, reason: String },

    #[error("request for source {source_id} failed: {reason}")]
    Http { source_id: String, reason: String },

    #[error("failed to read {path:?} for source {source_id}: {error}")]
    Io { source_id: String, path: PathBuf, error: std::io::Error },
}

impl SourceError {
    /// ID of the source that failed
    pub fn source_id(&self) -> &str {
        match self {
            SourceError::Empty { source_id }
            | SourceError::Encoding { source_id, .. }
            | SourceError::Header { source_id, .. }
            | SourceError::MissingColumn { source_id, .. }
            | SourceError::Json { source_id, .. }
            | SourceError::Shape { source_id, .. }
            | SourceError::Http { source_id, .. }
            | SourceError::Io { source_id, .. } => source_id,
        }
    }
}

/// Why a single row was refused. Never fails a parse on its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("missing player name")]
    MissingName,

    #[error("missing position")]
    MissingPosition,

    #[error("position '{0}' is not one of QB, RB, WR, TE, K, DEF")]
    InvalidPosition(String),

    #[error("missing team")]
    MissingTeam,

    #[error("invalid week '{0}'")]
    InvalidWeek(String),

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("malformed row: {0}")]
    Malformed(String),
}
