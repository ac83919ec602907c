//! # Command Line Interface
//!
//! Aggregate, score and resolve players from the command line; results are
//! printed as JSON on stdout.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use feed_readers::{FetchLimiter, PlayerHint, Position, StaticSource};
use player_registry::IdentityResolver;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::aggregator::Aggregator;
use crate::benchmark::BenchmarkTable;
use crate::config::FusionConfig;
use crate::error::AggregateError;
use crate::models::PlayerRecord;
use crate::news::{InMemoryNewsStore, NewsStore};

/// Player data fusion CLI
#[derive(Parser)]
#[command(name = "fusion-engine")]
#[command(about = "Merge, rate and contextualize fantasy player feeds")]
pub struct Cli {
    /// Configuration file (TOML); FUSION__* environment variables override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build merged records for one or more players
    Aggregate {
        #[command(flatten)]
        player: PlayerArgs,

        /// Week to aggregate
        #[arg(short, long)]
        week: u32,

        /// Additional player names sharing the same position and week
        #[arg(long = "also")]
        also: Vec<String>,
    },
    /// Rate a stat value against its position benchmark
    Score {
        /// Position (QB, RB, WR, TE, K, DEF)
        #[arg(short, long)]
        position: Position,

        /// Stat name (e.g. passing_yards)
        #[arg(short, long)]
        stat: String,

        /// Stat value
        #[arg(short, long, allow_negative_numbers = true)]
        value: f64,

        /// Games played
        #[arg(short, long)]
        games: u32,

        /// Treat lower values as better; defaults to the benchmark's setting
        #[arg(long)]
        lower_is_better: Option<bool>,
    },
    /// Resolve a player hint against the identities seen in every feed
    Resolve {
        #[command(flatten)]
        player: PlayerArgs,
    },
}

#[derive(Args)]
pub struct PlayerArgs {
    /// Player name as any feed spells it
    #[arg(short, long)]
    pub name: String,

    /// Position (QB, RB, WR, TE, K, DEF)
    #[arg(short, long)]
    pub position: Option<Position>,

    /// Team abbreviation
    #[arg(short, long)]
    pub team: Option<String>,

    /// Source-specific player ID
    #[arg(long)]
    pub external_id: Option<String>,
}

impl PlayerArgs {
    pub fn hint(&self) -> PlayerHint {
        with_details(PlayerHint::new(&self.name), self.position, self.team.as_deref(), self.external_id.as_deref())
    }
}

fn with_details(mut hint: PlayerHint, position: Option<Position>, team: Option<&str>, external_id: Option<&str>) -> PlayerHint {
    if let Some(position) = position {
        hint = hint.with_position(position);
    }
    if let Some(team) = team {
        hint = hint.with_team(team);
    }
    if let Some(external_id) = external_id {
        hint = hint.with_external_id(external_id);
    }
    hint
}

/// CLI handler
pub struct CliHandler {
    aggregator: Aggregator,
}

impl CliHandler {
    /// Load configuration, benchmarks and news, and wire the aggregator
    pub async fn new(config: FusionConfig) -> Result<Self> {
        let benchmarks = BenchmarkTable::from_json_file(&config.benchmarks_path)
            .with_context(|| format!("Failed to load benchmarks from {:?}", config.benchmarks_path))?;
        let limiter = FetchLimiter::new(config.fetch.max_concurrent);
        let news_path = config.news_path.clone();
        let news_limit = config.news_limit;

        let mut aggregator =
            Aggregator::from_config(config, Arc::new(IdentityResolver::new()), Arc::new(benchmarks), limiter)?;

        if let Some(path) = news_path {
            let payload = tokio::fs::read(&path).await.with_context(|| format!("Failed to read news from {path:?}"))?;
            let store = InMemoryNewsStore::load(&StaticSource::new("news", payload))
                .await
                .context("Failed to parse news")?
                .with_limit(news_limit);
            info!(items = store.len(), "Loaded news");
            aggregator = aggregator.with_news_store(Arc::new(store) as Arc<dyn NewsStore>);
        }

        Ok(Self { aggregator })
    }

    /// Handle CLI commands
    pub async fn handle_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Aggregate { player, week, also } => self.aggregate(player, week, also).await,
            Commands::Score { position, stat, value, games, lower_is_better } => {
                self.score(position, &stat, value, games, lower_is_better)
            }
            Commands::Resolve { player } => self.resolve(player).await,
        }
    }

    async fn aggregate(&self, player: PlayerArgs, week: u32, also: Vec<String>) -> Result<()> {
        if also.is_empty() {
            let record = self.aggregator.aggregate(&player.hint(), week).await?;
            return print_json(&record);
        }

        let mut hints = vec![player.hint()];
        hints.extend(also.iter().map(|name| with_details(PlayerHint::new(name), player.position, None, None)));

        let results = self.aggregator.aggregate_many(&hints, week).await?;
        print_json(&batch_entries(&hints, results))
    }

    fn score(&self, position: Position, stat: &str, value: f64, games: u32, lower_is_better: Option<bool>) -> Result<()> {
        let benchmarks = self.aggregator.benchmarks();
        let score = match lower_is_better {
            Some(lower_is_better) => benchmarks.score(position, stat, value, games, lower_is_better)?,
            None => benchmarks.score_stat(position, stat, value, games)?,
        };
        print_json(&score)
    }

    async fn resolve(&self, player: PlayerArgs) -> Result<()> {
        let snapshot = self.aggregator.load_snapshot().await?;
        let unresolved = self.aggregator.index_snapshot(&snapshot);
        info!(identities = self.aggregator.resolver().len(), unresolved, "Indexed feed identities");

        let resolution = self.aggregator.resolver().resolve_detailed(&player.hint())?;
        print_json(&resolution)
    }
}

/// One player's outcome in a batch aggregate
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchEntry {
    Ok { name: String, record: Box<PlayerRecord> },
    Error { name: String, stage: String, source_id: Option<String>, error: String },
}

/// Pair every hint with its result; a failed player does not hide the others
pub fn batch_entries(hints: &[PlayerHint], results: Vec<Result<PlayerRecord, AggregateError>>) -> Vec<BatchEntry> {
    hints
        .iter()
        .zip(results)
        .map(|(hint, result)| match result {
            Ok(record) => BatchEntry::Ok { name: hint.name.clone(), record: Box::new(record) },
            Err(error) => {
                warn!(player = %hint.name, %error, "Failed to aggregate player");
                BatchEntry::Error {
                    name: hint.name.clone(),
                    stage: error.stage().to_string(),
                    source_id: error.source_id().map(str::to_string),
                    error: error.to_string(),
                }
            }
        })
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}
