use feed_readers::{HomeAway, NewsItem, SkippedRow};
use player_registry::PlayerIdentity;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::config::ScoringFormat;

/// Merged view of one player for one week
#[derive(Debug, Clone, Serialize)]
pub struct PlayerRecord {
    pub identity: PlayerIdentity,

    /// Requested week; `None` for a season-only merge
    pub week: Option<u32>,

    /// Merged stats; stats no source reported are absent, not zero
    pub stats: BTreeMap<String, f64>,

    /// Source each merged stat was taken from
    pub stat_sources: BTreeMap<String, String>,

    /// Whether each merged stat is a season total or a value for the week
    pub stat_scopes: BTreeMap<String, StatScope>,

    /// Season totals replaced by a week value for the same stat
    pub shadowed_season_stats: BTreeMap<String, f64>,

    /// Every rejected reporter of a conflicting stat
    pub discrepancies: Vec<Discrepancy>,

    /// News for the player's external IDs, newest first
    pub news: Vec<NewsItem>,

    pub context: Option<MatchupContext>,

    pub signals: Option<SituationalSignals>,

    /// Benchmark rating per merged stat that has a benchmark
    pub ratings: BTreeMap<String, Score>,

    pub projection: Option<FantasyProjection>,

    pub diagnostics: Diagnostics,
}

impl PlayerRecord {
    /// Empty record for an identity
    pub fn new(identity: PlayerIdentity, week: Option<u32>) -> Self {
        Self {
            identity,
            week,
            stats: BTreeMap::new(),
            stat_sources: BTreeMap::new(),
            stat_scopes: BTreeMap::new(),
            shadowed_season_stats: BTreeMap::new(),
            discrepancies: Vec::new(),
            news: Vec::new(),
            context: None,
            signals: None,
            ratings: BTreeMap::new(),
            projection: None,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn stat(&self, name: &str) -> Option<f64> {
        self.stats.get(name).copied()
    }

    pub fn scope(&self, name: &str) -> Option<StatScope> {
        self.stat_scopes.get(name).copied()
    }

    /// Season games played, falling back to the week's count when no season
    /// row reported it; 0 when absent
    pub fn games_played(&self) -> f64 {
        self.shadowed_season_stats
            .get("games_played")
            .copied()
            .or_else(|| self.stat("games_played"))
            .unwrap_or(0.0)
            .max(0.0)
    }

    /// Merged stats of one scope only
    pub fn scoped_stats(&self, scope: StatScope) -> BTreeMap<String, f64> {
        self.stats
            .iter()
            .filter(|(stat, _)| self.scope(stat) == Some(scope))
            .map(|(stat, value)| (stat.clone(), *value))
            .collect()
    }

    /// Week when any merged stat is a week value, otherwise season
    pub fn primary_scope(&self) -> StatScope {
        if self.stat_scopes.values().any(|scope| *scope == StatScope::Week) {
            StatScope::Week
        } else {
            StatScope::Season
        }
    }
}

/// Whether a stat row covers the whole season or a single week
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatScope {
    Week,
    Season,
}

impl StatScope {
    pub fn of(week: Option<u32>) -> Self {
        match week {
            Some(_) => StatScope::Week,
            None => StatScope::Season,
        }
    }
}

/// A reporter whose value lost a merge conflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub stat: String,
    /// Value the losing source reported
    pub rejected: f64,
    /// Losing source
    pub source: String,
    pub accepted: f64,
    pub accepted_source: String,
}

/// Percentile bucket a value falls into; serializes as 25, 50, 75 or 90
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PercentileBucket {
    P25,
    P50,
    P75,
    P90,
}

impl PercentileBucket {
    pub fn as_u8(&self) -> u8 {
        match self {
            PercentileBucket::P25 => 25,
            PercentileBucket::P50 => 50,
            PercentileBucket::P75 => 75,
            PercentileBucket::P90 => 90,
        }
    }
}

impl Serialize for PercentileBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Green,
    Yellow,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Above,
    Average,
    Below,
}

/// A stat value rated against its position benchmark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rating {
    pub bucket: PercentileBucket,
    pub color: Color,
    pub comparison: Comparison,
}

impl Rating {
    /// Color and comparison for a bucket; lower-is-better stats mirror both
    pub fn from_bucket(bucket: PercentileBucket, lower_is_better: bool) -> Self {
        let (good, bad) = if lower_is_better {
            (bucket == PercentileBucket::P25, bucket >= PercentileBucket::P75)
        } else {
            (bucket >= PercentileBucket::P75, bucket == PercentileBucket::P25)
        };

        let (color, comparison) = if good {
            (Color::Green, Comparison::Above)
        } else if bad {
            (Color::Red, Comparison::Below)
        } else {
            (Color::Yellow, Comparison::Average)
        };

        Self { bucket, color, comparison }
    }
}

/// Outcome of scoring one stat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Score {
    Rated(Rating),
    /// Games played is below the position floor
    InsufficientSample { games_played: u32, min_games: u32 },
}

impl Score {
    pub fn rating(&self) -> Option<&Rating> {
        match self {
            Score::Rated(rating) => Some(rating),
            Score::InsufficientSample { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "team", rename_all = "snake_case")]
pub enum Opponent {
    Team(String),
    Bye,
    /// No schedule entry for the player's team and week
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchupLevel {
    Easy,
    Neutral,
    Hard,
}

/// Matchup difficulty from the opponent's points allowed to the position
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Difficulty {
    Rated { bucket: PercentileBucket, level: MatchupLevel, points_allowed: f64 },
    Unrated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchupContext {
    pub team: Option<String>,
    pub week: u32,
    pub opponent: Opponent,
    pub home_away: Option<HomeAway>,
    pub difficulty: Difficulty,
}

/// Injury designation, least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjuryFlag {
    Questionable,
    Doubtful,
    Out,
    InjuredReserve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsFlag {
    Suspended,
    Traded,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedZoneRole {
    Primary,
    Secondary,
    Limited,
    /// Share reported as zero
    Uninvolved,
    /// No share stat reported
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SituationalSignals {
    /// Most severe injury designation found in the news
    pub injury: Option<InjuryFlag>,
    pub news_flags: Vec<NewsFlag>,
    pub red_zone_role: RedZoneRole,
    /// Share stat the role was derived from
    pub red_zone_share: Option<f64>,
}

/// Fantasy points derived from merged stats
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FantasyProjection {
    pub total: f64,
    pub per_game: Option<f64>,
    pub scoring: ScoringFormat,
}

/// Skipped rows of one source
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SkipSummary {
    pub count: usize,
    pub samples: Vec<SkippedRow>,
}

/// A source that could not be read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceGap {
    pub source: String,
    pub category: String,
    pub reason: String,
}

/// A hint that matched several identities and got a new one instead
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityWarning {
    pub source: String,
    pub name: String,
    pub team: Option<String>,
    pub candidates: usize,
}

/// Soft problems met while building a record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Skipped rows by source
    pub skipped_rows: BTreeMap<String, SkipSummary>,
    pub source_gaps: Vec<SourceGap>,
    pub identity_warnings: Vec<IdentityWarning>,
    /// No schedule entry for the player's team and week
    pub schedule_missing: bool,
    /// Games played below the position floor; ratings are not meaningful
    pub insufficient_sample: bool,
    /// Stat rows whose hint could not be resolved
    pub unresolved_rows: usize,
}
