use anyhow::Result;
use feed_readers::{ConfiguredSource, FeedFetcher, FeedSource, FetchLimiter, NewsItem, PlayerHint, RawStatRecord};
use player_registry::{IdentityResolver, PlayerIdentity, ResolutionOutcome};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::benchmark::BenchmarkTable;
use crate::config::{FeedKind, FusionConfig};
use crate::context::{derive_signals, ContextBuilder};
use crate::error::AggregateError;
use crate::merger::{merge, SourcePriority};
use crate::models::{Diagnostics, IdentityWarning, Opponent, PlayerRecord, Score, SourceGap, StatScope};
use crate::news::NewsStore;
use crate::projection::project;
use crate::snapshot::{FeedSnapshot, RegisteredSource};

/// Aggregator - fetches every feed, resolves identities and builds merged
/// player records
///
/// The identity index is injected and shared; it is the only mutable state
/// touched per call, and never across an `.await`.
pub struct Aggregator {
    config: FusionConfig,
    resolver: Arc<IdentityResolver>,
    benchmarks: Arc<BenchmarkTable>,
    limiter: FetchLimiter,
    sources: Vec<RegisteredSource>,
    news: Option<Arc<dyn NewsStore>>,
    priority: SourcePriority,
}

impl Aggregator {
    /// Create an aggregator with no sources registered
    pub fn new(
        config: FusionConfig,
        resolver: Arc<IdentityResolver>,
        benchmarks: Arc<BenchmarkTable>,
        limiter: FetchLimiter,
    ) -> Self {
        let priority = SourcePriority::new(config.source_priority.iter().cloned());
        Self { config, resolver, benchmarks, limiter, sources: Vec::new(), news: None, priority }
    }

    /// Create an aggregator fetching the configured sources over HTTP or from disk
    pub fn from_config(
        config: FusionConfig,
        resolver: Arc<IdentityResolver>,
        benchmarks: Arc<BenchmarkTable>,
        limiter: FetchLimiter,
    ) -> Result<Self> {
        let fetcher = Arc::new(FeedFetcher::new(Duration::from_secs(config.fetch.timeout_secs))?);
        let sources = config.sources.clone();

        let mut aggregator = Self::new(config, resolver, benchmarks, limiter);
        for source in sources {
            let configured = ConfiguredSource::new(source.id, source.location, Arc::clone(&fetcher));
            aggregator = aggregator.with_source(source.kind, source.required, Arc::new(configured));
        }
        Ok(aggregator)
    }

    pub fn with_source(mut self, kind: FeedKind, required: bool, source: Arc<dyn FeedSource>) -> Self {
        self.sources.push(RegisteredSource::new(kind, required, source));
        self
    }

    pub fn with_news_store(mut self, store: Arc<dyn NewsStore>) -> Self {
        self.news = Some(store);
        self
    }

    pub fn resolver(&self) -> &Arc<IdentityResolver> {
        &self.resolver
    }

    pub fn benchmarks(&self) -> &BenchmarkTable {
        &self.benchmarks
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Fetch and parse every registered source once
    pub async fn load_snapshot(&self) -> Result<FeedSnapshot, AggregateError> {
        FeedSnapshot::load(&self.sources, &self.limiter).await
    }

    /// Build the merged record for one player and week
    pub async fn aggregate(&self, hint: &PlayerHint, week: u32) -> Result<PlayerRecord, AggregateError> {
        let snapshot = self.load_snapshot().await?;
        self.aggregate_with_snapshot(&snapshot, hint, week).await
    }

    /// Build records for many players from one fetched snapshot.
    ///
    /// Fails as a whole only when the snapshot cannot be loaded.
    pub async fn aggregate_many(
        &self,
        hints: &[PlayerHint],
        week: u32,
    ) -> Result<Vec<Result<PlayerRecord, AggregateError>>, AggregateError> {
        let snapshot = self.load_snapshot().await?;
        let mut records = Vec::with_capacity(hints.len());
        for hint in hints {
            records.push(self.aggregate_with_snapshot(&snapshot, hint, week).await);
        }
        Ok(records)
    }

    /// Resolve every stat row of a snapshot, seeding the identity index.
    /// Returns the number of rows that could not be resolved.
    pub fn index_snapshot(&self, snapshot: &FeedSnapshot) -> usize {
        snapshot.records.iter().filter(|record| self.resolver.resolve(&record.hint()).is_err()).count()
    }

    /// Build the merged record for one player and week from a loaded snapshot
    pub async fn aggregate_with_snapshot(
        &self,
        snapshot: &FeedSnapshot,
        hint: &PlayerHint,
        week: u32,
    ) -> Result<PlayerRecord, AggregateError> {
        let mut diagnostics = Diagnostics {
            skipped_rows: snapshot.skipped.clone(),
            source_gaps: snapshot.gaps.clone(),
            ..Diagnostics::default()
        };

        let target = self
            .resolver
            .resolve_detailed(hint)
            .map_err(|error| AggregateError::Resolve { name: hint.name.clone(), error })?;
        if let ResolutionOutcome::CreatedAmbiguous { candidates } = target.outcome {
            diagnostics.identity_warnings.push(IdentityWarning {
                source: "request".to_string(),
                name: hint.name.clone(),
                team: hint.team.clone(),
                candidates,
            });
        }
        let target = target.identity;

        let (records, unresolved) = self.records_for(snapshot, &target, week, &mut diagnostics.identity_warnings);
        diagnostics.unresolved_rows = unresolved;

        // Re-read the identity: row resolution may have bound external IDs or a team
        let identity = self.resolver.get(target.id).unwrap_or(target);
        debug!(player = %identity.display_name, id = %identity.id, rows = records.len(), week, "Merging player rows");

        let mut record = merge(&identity, Some(week), &records, &self.priority)
            .map_err(|error| AggregateError::Merge { source_id: error.source_id().to_string(), error })?;

        record.news = self.collect_news(&identity, hint, &mut diagnostics.source_gaps).await;

        let context = ContextBuilder::new(&snapshot.schedule)
            .with_defense(&snapshot.defense, &self.benchmarks)
            .build(&record, week);
        if context.opponent == Opponent::Unknown {
            warn!(player = %identity.display_name, team = ?identity.team, week, "No schedule entry for player");
            diagnostics.schedule_missing = true;
        }
        record.context = Some(context);
        record.signals = Some(derive_signals(&record, &self.config.context));

        self.rate(&mut record, &mut diagnostics);
        record.projection = project(&record.scoped_stats(record.primary_scope()), &self.config.scoring);
        record.diagnostics = diagnostics;

        info!(
            player = %record.identity.display_name,
            week,
            stats = record.stats.len(),
            discrepancies = record.discrepancies.len(),
            news = record.news.len(),
            "Aggregated player record"
        );
        Ok(record)
    }

    /// Rows of the snapshot that belong to `target` in season scope or `week`
    fn records_for(
        &self,
        snapshot: &FeedSnapshot,
        target: &PlayerIdentity,
        week: u32,
        warnings: &mut Vec<IdentityWarning>,
    ) -> (Vec<RawStatRecord>, usize) {
        let mut kept = Vec::new();
        let mut unresolved = 0;

        for row in &snapshot.records {
            if row.week.is_some_and(|w| w != week) {
                continue;
            }
            let resolution = match self.resolver.resolve_detailed(&row.hint()) {
                Ok(resolution) => resolution,
                Err(error) => {
                    debug!(source = %row.source, name = %row.name, %error, "Unresolvable row");
                    unresolved += 1;
                    continue;
                }
            };
            if let ResolutionOutcome::CreatedAmbiguous { candidates } = resolution.outcome {
                if resolution.identity.normalized_name == target.normalized_name {
                    warnings.push(IdentityWarning {
                        source: row.source.clone(),
                        name: row.name.clone(),
                        team: row.team.clone(),
                        candidates,
                    });
                }
            }
            if resolution.identity.id == target.id {
                kept.push(row.clone());
            }
        }

        (kept, unresolved)
    }

    /// News for every external ID bound to the player, newest first
    async fn collect_news(&self, identity: &PlayerIdentity, hint: &PlayerHint, gaps: &mut Vec<SourceGap>) -> Vec<NewsItem> {
        let Some(store) = &self.news else {
            return Vec::new();
        };

        let mut external_ids: BTreeSet<&str> = identity.external_ids.iter().map(String::as_str).collect();
        external_ids.extend(hint.external_id.as_deref());

        let mut items: Vec<NewsItem> = Vec::new();
        for external_id in external_ids {
            match store.news_for(external_id).await {
                Ok(found) => items.extend(found),
                Err(error) => {
                    warn!(player = %identity.display_name, external_id, %error, "News lookup failed");
                    gaps.push(SourceGap {
                        source: error.source_id().to_string(),
                        category: "news".to_string(),
                        reason: error.to_string(),
                    });
                }
            }
        }

        items.sort_by(|a, b| b.published_at.cmp(&a.published_at).then_with(|| a.headline.cmp(&b.headline)));
        items.dedup();
        items.truncate(self.config.news_limit);
        items
    }

    /// Rate every merged stat that has a benchmark for the player's position
    fn rate(&self, record: &mut PlayerRecord, diagnostics: &mut Diagnostics) {
        let position = record.identity.position;
        let Some(benchmark) = self.benchmarks.position(position) else {
            debug!(%position, "No benchmarks for position");
            return;
        };

        let games = record.games_played();
        let games_played = games.floor() as u32;

        for (stat, value) in &record.stats {
            let Some(stat_benchmark) = benchmark.stats.get(stat) else {
                continue;
            };
            // A week value already covers a single game
            let season_total = record.stat_scopes.get(stat) == Some(&StatScope::Season);
            let value = if stat_benchmark.per_game && season_total && games > 0.0 { value / games } else { *value };

            match self.benchmarks.score(position, stat, value, games_played, stat_benchmark.lower_is_better) {
                Ok(score) => {
                    if matches!(score, Score::InsufficientSample { .. }) {
                        diagnostics.insufficient_sample = true;
                    }
                    record.ratings.insert(stat.clone(), score);
                }
                Err(error) => debug!(stat = %stat, %error, "Stat not rated"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_readers::{Position, StaticSource};

    fn aggregator(sources: Vec<(FeedKind, bool, &str, &str)>) -> Aggregator {
        let mut aggregator = Aggregator::new(
            FusionConfig::default(),
            Arc::new(IdentityResolver::new()),
            Arc::new(BenchmarkTable::default()),
            FetchLimiter::new(2),
        );
        for (kind, required, id, payload) in sources {
            aggregator = aggregator.with_source(kind, required, Arc::new(StaticSource::new(id, payload)));
        }
        aggregator
    }

    const WEEKLY: &str = "player_id,player_display_name,position,recent_team,week,receptions,receiving_yards\n\
                          00-1,Puka Nacua,WR,LAR,1,10,119\n\
                          00-1,Puka Nacua,WR,LAR,2,15,147\n\
                          00-2,Cooper Kupp,WR,LAR,2,4,50\n";

    #[tokio::test]
    async fn test_week_scoping() {
        let aggregator = aggregator(vec![(FeedKind::SeasonStats, true, "weekly", WEEKLY)]);
        let hint = PlayerHint::new("Puka Nacua").with_position(Position::Wr);

        let week_two = aggregator.aggregate(&hint, 2).await.unwrap();
        assert_eq!(week_two.stat("receptions"), Some(15.0));
        assert_eq!(week_two.stat("receiving_yards"), Some(147.0));
        assert!(week_two.discrepancies.is_empty());

        let week_one = aggregator.aggregate(&hint, 1).await.unwrap();
        assert_eq!(week_one.stat("receptions"), Some(10.0));
        assert_eq!(week_one.identity.id, week_two.identity.id);
    }

    #[tokio::test]
    async fn test_external_ids_are_bound_from_rows() {
        let aggregator = aggregator(vec![(FeedKind::SeasonStats, true, "weekly", WEEKLY)]);
        let hint = PlayerHint::new("Cooper Kupp").with_position(Position::Wr);

        let record = aggregator.aggregate(&hint, 2).await.unwrap();
        assert!(record.identity.external_ids.contains("00-2"));
        assert_eq!(record.identity.team.as_deref(), Some("LAR"));
        assert_eq!(aggregator.resolver().get_by_external_id("00-2").map(|i| i.id), Some(record.identity.id));
    }

    #[tokio::test]
    async fn test_resolve_failure_is_staged() {
        let aggregator = aggregator(vec![(FeedKind::SeasonStats, true, "weekly", WEEKLY)]);
        let err = aggregator.aggregate(&PlayerHint::new("..."), 2).await.unwrap_err();
        assert_eq!(err.stage(), crate::error::Stage::Resolve);
        assert_eq!(err.source_id(), None);
    }

    #[tokio::test]
    async fn test_aggregate_many_shares_snapshot() {
        let aggregator = aggregator(vec![(FeedKind::SeasonStats, true, "weekly", WEEKLY)]);
        let hints = vec![
            PlayerHint::new("Puka Nacua").with_position(Position::Wr),
            PlayerHint::new("Cooper Kupp").with_position(Position::Wr),
            PlayerHint::new("").with_position(Position::Wr),
        ];

        let results = aggregator.aggregate_many(&hints, 2).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().stat("receptions"), Some(15.0));
        assert_eq!(results[1].as_ref().unwrap().stat("receptions"), Some(4.0));
        assert!(results[2].is_err());
    }

    #[tokio::test]
    async fn test_index_snapshot_seeds_identities() {
        let aggregator = aggregator(vec![(FeedKind::SeasonStats, true, "weekly", WEEKLY)]);
        let snapshot = aggregator.load_snapshot().await.unwrap();

        assert_eq!(aggregator.index_snapshot(&snapshot), 0);
        assert_eq!(aggregator.resolver().len(), 2);
        assert_eq!(aggregator.resolver().search("kupp").len(), 1);
    }
}
