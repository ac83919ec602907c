//! Fusion engine configuration

use anyhow::{Context, Result};
use feed_readers::{FeedLocation, Position};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Configuration for the fusion engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Feeds to fetch on every aggregation
    pub sources: Vec<SourceConfig>,

    /// Merge priority, highest first; unlisted sources rank after these
    pub source_priority: Vec<String>,

    /// Position benchmark JSON file
    pub benchmarks_path: PathBuf,

    /// News JSON file backing the in-memory news store
    pub news_path: Option<PathBuf>,

    /// Maximum news items attached per player
    pub news_limit: usize,

    /// Fetch settings
    pub fetch: FetchConfig,

    /// Fantasy scoring settings
    pub scoring: ScoringConfig,

    /// Matchup and situational signal settings
    pub context: ContextConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// One configured feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source ID used in records, priority and diagnostics
    pub id: String,

    /// Which reader parses the payload
    pub kind: FeedKind,

    /// Where the payload lives
    pub location: FeedLocation,

    /// The call fails when every source of a required category is unreadable
    #[serde(default)]
    pub required: bool,
}

/// Feed shape, selecting the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    SeasonStats,
    Adp,
    RedZone { position: Position },
    MarketShare { position: Position },
    Schedule,
    Defense,
}

impl FeedKind {
    /// Category name used for the required-source check and gap reports
    pub fn category(&self) -> &'static str {
        match self {
            FeedKind::SeasonStats => "season_stats",
            FeedKind::Adp => "adp",
            FeedKind::RedZone { .. } => "red_zone",
            FeedKind::MarketShare { .. } => "market_share",
            FeedKind::Schedule => "schedule",
            FeedKind::Defense => "defense",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Upper bound on in-flight fetches
    pub max_concurrent: usize,

    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

/// Fantasy scoring format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringFormat {
    Standard,
    HalfPpr,
    Ppr,
}

impl ScoringFormat {
    /// Points per reception
    pub fn reception_points(&self) -> f64 {
        match self {
            ScoringFormat::Standard => 0.0,
            ScoringFormat::HalfPpr => 0.5,
            ScoringFormat::Ppr => 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub format: ScoringFormat,

    /// Points per unit of each stat; receptions come from `format`
    pub weights: BTreeMap<String, f64>,
}

impl ScoringConfig {
    /// Scoring for a format with the default weights
    pub fn for_format(format: ScoringFormat) -> Self {
        Self { format, ..Self::default() }
    }

    /// Weight for a stat, including receptions
    pub fn weight(&self, stat: &str) -> Option<f64> {
        if stat == "receptions" {
            return Some(self.format.reception_points());
        }
        self.weights.get(stat).copied()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Red-zone share stats consulted in order; the first present wins
    pub red_zone_share_stats: Vec<String>,

    /// Share (percent) at or above which the player is the primary option
    pub primary_share: f64,

    /// Share (percent) at or above which the player is a secondary option
    pub secondary_share: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, json, compact)
    pub format: String,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            source_priority: Vec::new(),
            benchmarks_path: PathBuf::from("data/benchmarks.json"),
            news_path: None,
            news_limit: 10,
            fetch: FetchConfig::default(),
            scoring: ScoringConfig::default(),
            context: ContextConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { max_concurrent: 4, timeout_secs: 30 }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let weights = [
            ("passing_yards", 0.04),
            ("passing_tds", 4.0),
            ("interceptions", -2.0),
            ("rushing_yards", 0.1),
            ("rushing_tds", 6.0),
            ("receiving_yards", 0.1),
            ("receiving_tds", 6.0),
            ("fumbles_lost", -2.0),
            ("passing_2pt_conversions", 2.0),
            ("rushing_2pt_conversions", 2.0),
            ("receiving_2pt_conversions", 2.0),
        ];

        Self {
            format: ScoringFormat::Ppr,
            weights: weights.into_iter().map(|(stat, points)| (stat.to_string(), points)).collect(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            red_zone_share_stats: vec!["rz_target_share".to_string(), "rz_carry_share".to_string()],
            primary_share: 25.0,
            secondary_share: 10.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl FusionConfig {
    /// Load configuration from an optional file, overridden by `FUSION__*`
    /// environment variables (e.g. `FUSION__LOGGING__LEVEL=debug`)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            tracing::debug!("Loading configuration from file: {:?}", path);
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: FusionConfig = builder
            .add_source(config::Environment::with_prefix("FUSION").separator("__"))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(anyhow::anyhow!("Invalid log level: {}", self.logging.level)),
        }

        match self.logging.format.as_str() {
            "json" | "pretty" | "compact" => {}
            _ => return Err(anyhow::anyhow!("Invalid log format: {}", self.logging.format)),
        }

        if self.fetch.max_concurrent == 0 {
            return Err(anyhow::anyhow!("fetch.max_concurrent must be at least 1"));
        }

        if self.context.secondary_share > self.context.primary_share {
            return Err(anyhow::anyhow!(
                "context.secondary_share ({}) exceeds context.primary_share ({})",
                self.context.secondary_share,
                self.context.primary_share
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.id.as_str()) {
                return Err(anyhow::anyhow!("Duplicate source id: {}", source.id));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = FusionConfig::default();
        assert_eq!(config.fetch.max_concurrent, 4);
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.scoring.format, ScoringFormat::Ppr);
        assert_eq!(config.scoring.weight("receptions"), Some(1.0));
        assert_eq!(config.scoring.weight("passing_yards"), Some(0.04));
        assert_eq!(config.scoring.weight("adp_ppr"), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reception_points_follow_format() {
        assert_eq!(ScoringConfig::for_format(ScoringFormat::Standard).weight("receptions"), Some(0.0));
        assert_eq!(ScoringConfig::for_format(ScoringFormat::HalfPpr).weight("receptions"), Some(0.5));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
source_priority = ["nflverse", "fantasypros"]
benchmarks_path = "bench.json"
news_limit = 3

[fetch]
max_concurrent = 2

[scoring]
format = "half_ppr"

[[sources]]
id = "nflverse"
kind = "season_stats"
required = true
location = {{ type = "url", url = "https://example.com/stats.csv" }}

[[sources]]
id = "rz-wr"
kind = {{ red_zone = {{ position = "WR" }} }}
location = {{ type = "path", path = "feeds/rz_wr.csv" }}
"#
        )
        .unwrap();

        let config = FusionConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.source_priority, vec!["nflverse", "fantasypros"]);
        assert_eq!(config.benchmarks_path, PathBuf::from("bench.json"));
        assert_eq!(config.news_limit, 3);
        assert_eq!(config.fetch.max_concurrent, 2);
        // Unset fields keep their defaults
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.scoring.format, ScoringFormat::HalfPpr);
        assert_eq!(config.scoring.weight("rushing_tds"), Some(6.0));

        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].kind, FeedKind::SeasonStats);
        assert!(config.sources[0].required);
        assert_eq!(config.sources[1].kind, FeedKind::RedZone { position: Position::Wr });
        assert!(!config.sources[1].required);
        assert_eq!(config.sources[1].location, FeedLocation::Path { path: PathBuf::from("feeds/rz_wr.csv") });
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FusionConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = FusionConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = FusionConfig::default();
        config.fetch.max_concurrent = 0;
        assert!(config.validate().is_err());

        let mut config = FusionConfig::default();
        let source = SourceConfig {
            id: "dup".to_string(),
            kind: FeedKind::Adp,
            location: FeedLocation::Path { path: PathBuf::from("a.csv") },
            required: false,
        };
        config.sources = vec![source.clone(), source];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_feed_kind_categories() {
        assert_eq!(FeedKind::RedZone { position: Position::Te }.category(), "red_zone");
        assert_eq!(FeedKind::MarketShare { position: Position::Rb }.to_string(), "market_share");
    }
}
