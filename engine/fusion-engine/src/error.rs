use feed_readers::Position;
use player_registry::ResolveError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage a hard failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Read,
    Resolve,
    Merge,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Read => write!(f, "read"),
            Stage::Resolve => write!(f, "resolve"),
            Stage::Merge => write!(f, "merge"),
        }
    }
}

/// Errors that abort an aggregation call
#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("[{stage}] no readable {category} source; {source_id} failed: {reason}")]
    SourceUnreadable { stage: Stage, category: String, source_id: String, reason: String },

    #[error("[resolve] cannot resolve '{name}'")]
    Resolve {
        name: String,
        #[source]
        error: ResolveError,
    },

    #[error("[merge] record from {source_id} rejected")]
    Merge {
        source_id: String,
        #[source]
        error: MergeError,
    },
}

impl AggregateError {
    pub fn stage(&self) -> Stage {
        match self {
            AggregateError::SourceUnreadable { stage, .. } => *stage,
            AggregateError::Resolve { .. } => Stage::Resolve,
            AggregateError::Merge { .. } => Stage::Merge,
        }
    }

    /// Source the failure is attributed to, when there is one
    pub fn source_id(&self) -> Option<&str> {
        match self {
            AggregateError::SourceUnreadable { source_id, .. } | AggregateError::Merge { source_id, .. } => {
                Some(source_id)
            }
            AggregateError::Resolve { .. } => None,
        }
    }
}

/// Merge contract violations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    #[error("record from {source_id} has position {found}, identity is {expected}")]
    PositionMismatch { source_id: String, expected: Position, found: Position },
}

impl MergeError {
    pub fn source_id(&self) -> &str {
        match self {
            MergeError::PositionMismatch { source_id, .. } => source_id,
        }
    }
}

/// Benchmark lookup and loading errors
#[derive(Error, Debug)]
pub enum BenchmarkError {
    #[error("no benchmarks for position {0}")]
    UnknownPosition(Position),

    #[error("no {position} benchmark for stat '{stat}'")]
    UnknownStat { position: Position, stat: String },

    #[error("{position} benchmark for '{stat}' is not ordered p25 <= p50 <= p75")]
    InvalidPercentiles { position: Position, stat: String },

    #[error("failed to read benchmarks from {path}")]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("invalid benchmark JSON")]
    Json(#[from] serde_json::Error),
}
