//! One fetched-and-parsed view of every configured feed

use feed_readers::{
    AdpReader, DefenseReader, DefenseTable, FeedSource, FetchLimiter, NameKeyedReader, ParsedFeed, RawStatRecord,
    ScheduleReader, ScheduleTable, SeasonStatsReader, SourceError, StatReader,
};
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::FeedKind;
use crate::error::{AggregateError, Stage};
use crate::models::{SkipSummary, SourceGap};

/// A feed source with the reader kind and requirement it was registered with
#[derive(Clone)]
pub struct RegisteredSource {
    pub kind: FeedKind,
    pub required: bool,
    pub source: Arc<dyn FeedSource>,
}

impl RegisteredSource {
    pub fn new(kind: FeedKind, required: bool, source: Arc<dyn FeedSource>) -> Self {
        Self { kind, required, source }
    }

    pub fn id(&self) -> &str {
        self.source.id()
    }
}

/// A parsed payload, by feed shape
enum Parsed {
    Records(ParsedFeed<RawStatRecord>),
    Schedule(ScheduleTable, ParsedFeed<()>),
    Defense(DefenseTable, ParsedFeed<()>),
}

fn parse_payload(kind: FeedKind, source_id: &str, payload: &[u8]) -> Result<Parsed, SourceError> {
    let parsed = match kind {
        FeedKind::SeasonStats => Parsed::Records(SeasonStatsReader::new().parse(source_id, payload)?),
        FeedKind::Adp => Parsed::Records(AdpReader::new().parse(source_id, payload)?),
        FeedKind::RedZone { position } => Parsed::Records(NameKeyedReader::red_zone(position).parse(source_id, payload)?),
        FeedKind::MarketShare { position } => {
            Parsed::Records(NameKeyedReader::market_share(position).parse(source_id, payload)?)
        }
        FeedKind::Schedule => {
            let (table, feed) = ScheduleReader::new().parse_table(source_id, payload)?;
            Parsed::Schedule(table, feed)
        }
        FeedKind::Defense => {
            let (table, feed) = DefenseReader::new().parse_table(source_id, payload)?;
            Parsed::Defense(table, feed)
        }
    };
    Ok(parsed)
}

/// Every feed fetched and parsed once; reusable across many players
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    /// Stat rows from every readable stat-bearing source
    pub records: Vec<RawStatRecord>,
    pub schedule: ScheduleTable,
    pub defense: DefenseTable,
    /// Skipped rows by source
    pub skipped: BTreeMap<String, SkipSummary>,
    /// Sources that could not be fetched or parsed
    pub gaps: Vec<SourceGap>,
}

impl FeedSnapshot {
    /// Fetch every source concurrently through `limiter` and parse each
    /// payload with its reader.
    ///
    /// Unreadable sources become gaps. Fails only when every source of a
    /// category that has a required source is unreadable.
    pub async fn load(sources: &[RegisteredSource], limiter: &FetchLimiter) -> Result<Self, AggregateError> {
        let fetches = sources.iter().map(|registered| async move {
            limiter
                .run(registered.source.fetch())
                .await
                .and_then(|payload| parse_payload(registered.kind, registered.id(), &payload))
        });
        let outcomes = join_all(fetches).await;

        let mut snapshot = FeedSnapshot::default();
        let mut readable: BTreeSet<&'static str> = BTreeSet::new();
        let mut first_failure: BTreeMap<&'static str, (String, String)> = BTreeMap::new();

        for (registered, outcome) in sources.iter().zip(outcomes) {
            let category = registered.kind.category();
            match outcome {
                Ok(parsed) => {
                    readable.insert(category);
                    snapshot.absorb(parsed);
                }
                Err(error) => {
                    warn!(source = registered.id(), category, %error, "Source unreadable");
                    first_failure.entry(category).or_insert_with(|| (registered.id().to_string(), error.to_string()));
                    snapshot.gaps.push(SourceGap {
                        source: registered.id().to_string(),
                        category: category.to_string(),
                        reason: error.to_string(),
                    });
                }
            }
        }

        let required: BTreeSet<&'static str> =
            sources.iter().filter(|s| s.required).map(|s| s.kind.category()).collect();
        for category in required {
            if readable.contains(category) {
                continue;
            }
            let (source_id, reason) = first_failure.remove(category).unwrap_or_default();
            return Err(AggregateError::SourceUnreadable {
                stage: Stage::Read,
                category: category.to_string(),
                source_id,
                reason,
            });
        }

        info!(
            sources = sources.len(),
            records = snapshot.records.len(),
            schedule_entries = snapshot.schedule.len(),
            defense_entries = snapshot.defense.len(),
            gaps = snapshot.gaps.len(),
            "Loaded feed snapshot"
        );
        Ok(snapshot)
    }

    fn absorb(&mut self, parsed: Parsed) {
        match parsed {
            Parsed::Records(feed) => {
                self.note_skips(&feed);
                self.records.extend(feed.items);
            }
            Parsed::Schedule(table, feed) => {
                self.note_skips(&feed);
                // Later schedule sources fill in teams and weeks earlier ones lack
                for entry in table.entries() {
                    if self.schedule.get(&entry.team, entry.week).is_none() {
                        self.schedule.insert(entry.clone());
                    }
                }
            }
            Parsed::Defense(table, feed) => {
                self.note_skips(&feed);
                self.defense.merge_missing(&table);
            }
        }
    }

    fn note_skips<T>(&mut self, feed: &ParsedFeed<T>) {
        if feed.skipped == 0 {
            return;
        }
        debug!(source = %feed.source, skipped = feed.skipped, "Rows skipped");
        let summary = self.skipped.entry(feed.source.clone()).or_default();
        summary.count += feed.skipped;
        summary.samples.extend(feed.samples.iter().cloned());
    }
}
