//! Fusion Engine - merged, rated and contextualized player records
//!
//! Pulls every configured player feed, reconciles identities through the
//! shared identity index, merges stats by source priority, rates them against
//! position benchmarks and attaches matchup context, news and a fantasy-point
//! projection.

pub mod aggregator;
pub mod benchmark;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod merger;
pub mod models;
pub mod news;
pub mod projection;
pub mod snapshot;


pub use aggregator::Aggregator;
pub use benchmark::BenchmarkTable;
pub use crate::config::{FeedKind, FusionConfig, ScoringFormat, SourceConfig};
pub use context::{build_context, ContextBuilder};
pub use error::{AggregateError, BenchmarkError, MergeError, Stage};
pub use merger::{merge, SourcePriority};
pub use models::*;
pub use news::{InMemoryNewsStore, NewsStore};
pub use projection::project;
pub use snapshot::{FeedSnapshot, RegisteredSource};
