//! Feed Readers - parse raw player feeds into uniform records
//!
//! Every external feed (season stat tables, ADP rankings, red-zone and
//! market-share reports, schedules, defense-vs-position tables, news) has its
//! own reader. Readers convert the feed's shape into [`RawStatRecord`]s (or the
//! feed's table type) at the boundary, so no per-source shape leaks further
//! into the pipeline.

pub mod adp;
pub mod coerce;
pub mod defense;
pub mod error;
pub mod fetch;
pub mod name_keyed;
pub mod news;
pub mod schedule;
pub mod stats;
mod table;
pub mod types;

pub use adp::AdpReader;
pub use defense::DefenseReader;
pub use error::{SkipReason, SourceError};
pub use fetch::{ConfiguredSource, FeedFetcher, FeedLocation, FeedSource, FetchLimiter, StaticSource};
pub use name_keyed::NameKeyedReader;
pub use news::NewsReader;
pub use schedule::ScheduleReader;
pub use stats::SeasonStatsReader;
pub use types::{
    DefenseEntry, DefenseTable, HomeAway, NewsItem, ParsedFeed, PlayerHint, Position,
    RawStatRecord, ScheduleEntry, ScheduleTable, ScheduledOpponent, SkippedRow,
};

/// Maximum number of offending rows kept per parse for diagnostics
pub const MAX_SKIP_SAMPLES: usize = 5;

/// A reader that turns one feed's raw payload into stat records
pub trait StatReader: Send + Sync {
    /// Parse a raw payload. Fails only when the payload as a whole is unreadable.
    fn parse(&self, source_id: &str, payload: &[u8]) -> Result<ParsedFeed<RawStatRecord>, SourceError>;
}
