use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::SkipReason;
use crate::MAX_SKIP_SAMPLES;

/// Fantasy position codes accepted by every reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "QB")]
    Qb,
    #[serde(rename = "RB")]
    Rb,
    #[serde(rename = "WR")]
    Wr,
    #[serde(rename = "TE")]
    Te,
    #[serde(rename = "K")]
    K,
    #[serde(rename = "DEF")]
    Def,
}

impl Position {
    pub const ALL: [Position; 6] =
        [Position::Qb, Position::Rb, Position::Wr, Position::Te, Position::K, Position::Def];

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Qb => "QB",
            Position::Rb => "RB",
            Position::Wr => "WR",
            Position::Te => "TE",
            Position::K => "K",
            Position::Def => "DEF",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = SkipReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "QB" => Ok(Position::Qb),
            "RB" => Ok(Position::Rb),
            "WR" => Ok(Position::Wr),
            "TE" => Ok(Position::Te),
            "K" => Ok(Position::K),
            "DEF" => Ok(Position::Def),
            "" => Err(SkipReason::MissingPosition),
            other => Err(SkipReason::InvalidPosition(other.to_string())),
        }
    }
}

/// Whatever a source knows about who a row belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerHint {
    /// Player name as spelled by the source (e.g., "A.J. Brown")
    pub name: String,
    /// Team abbreviation (e.g., "PHI")
    pub team: Option<String>,
    /// Position, when the source reports one
    pub position: Option<Position>,
    /// Source-specific player ID (e.g., a gsis ID)
    pub external_id: Option<String>,
}

impl PlayerHint {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = crate::coerce::normalize_team(&team.into());
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        let id = external_id.into();
        self.external_id = if id.trim().is_empty() { None } else { Some(id.trim().to_string()) };
        self
    }
}

/// One row from one source for one player-week or player-season
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStatRecord {
    /// Source ID the row was read from
    pub source: String,
    /// Player name as spelled by the source
    pub name: String,
    /// Source-specific player ID, if the feed carries one
    pub external_id: Option<String>,
    /// Team abbreviation
    pub team: Option<String>,
    /// Position (always one of the accepted codes)
    pub position: Position,
    /// Week number, `None` for season aggregates
    pub week: Option<u32>,
    /// Stat name to value; sparse and source-specific
    pub stats: BTreeMap<String, f64>,
}

impl RawStatRecord {
    pub fn hint(&self) -> PlayerHint {
        PlayerHint {
            name: self.name.clone(),
            team: self.team.clone(),
            position: Some(self.position),
            external_id: self.external_id.clone(),
        }
    }

    pub fn stat(&self, name: &str) -> Option<f64> {
        self.stats.get(name).copied()
    }
}

/// A row a reader refused, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// 1-based line number in the payload
    pub line: u64,
    /// Why the row was refused
    pub reason: String,
    /// The raw row, fields joined with commas
    pub raw: String,
}

/// Result of parsing one payload: valid items plus skip diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedFeed<T> {
    /// Source ID the payload came from
    pub source: String,
    /// Rows that passed validation
    pub items: Vec<T>,
    /// Number of rows refused
    pub skipped: usize,
    /// First few refused rows
    pub samples: Vec<SkippedRow>,
}

impl<T> ParsedFeed<T> {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into(), items: Vec::new(), skipped: 0, samples: Vec::new() }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Record a refused row, keeping only the first few as samples
    pub fn skip(&mut self, line: u64, reason: SkipReason, raw: impl Into<String>) {
        debug!(source = %self.source, line, %reason, "skipping row");
        self.skipped += 1;
        if self.samples.len() < MAX_SKIP_SAMPLES {
            self.samples.push(SkippedRow { line, reason: reason.to_string(), raw: raw.into() });
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Swap the items for another type, keeping the diagnostics
    pub fn map_items<U>(self, f: impl FnOnce(Vec<T>) -> Vec<U>) -> ParsedFeed<U> {
        ParsedFeed { source: self.source, items: f(self.items), skipped: self.skipped, samples: self.samples }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeAway {
    Home,
    Away,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledOpponent {
    Team(String),
    Bye,
}

/// One team's game (or bye) in one week
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub team: String,
    pub week: u32,
    pub opponent: ScheduledOpponent,
    pub home_away: Option<HomeAway>,
}

/// Schedule lookup keyed by (team, week)
#[derive(Debug, Clone, Default)]
pub struct ScheduleTable {
    entries: HashMap<(String, u32), ScheduleEntry>,
}

impl ScheduleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = ScheduleEntry>) -> Self {
        let mut table = Self::new();
        table.extend(entries);
        table
    }

    pub fn insert(&mut self, entry: ScheduleEntry) {
        self.entries.insert((entry.team.to_ascii_uppercase(), entry.week), entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = ScheduleEntry>) {
        for entry in entries {
            self.insert(entry);
        }
    }

    pub fn get(&self, team: &str, week: u32) -> Option<&ScheduleEntry> {
        self.entries.get(&(team.to_ascii_uppercase(), week))
    }

    pub fn entries(&self) -> impl Iterator<Item = &ScheduleEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fantasy points a defense allows per game to one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefenseEntry {
    pub team: String,
    pub position: Position,
    pub points_allowed: f64,
}

/// Defense-vs-position lookup keyed by (team, position)
#[derive(Debug, Clone, Default)]
pub struct DefenseTable {
    allowed: HashMap<(String, Position), f64>,
}

impl DefenseTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = DefenseEntry>) -> Self {
        let mut table = Self::new();
        table.extend(entries);
        table
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = DefenseEntry>) {
        for entry in entries {
            self.allowed.insert((entry.team.to_ascii_uppercase(), entry.position), entry.points_allowed);
        }
    }

    /// Add rows from `other` for (team, position) pairs not yet present
    pub fn merge_missing(&mut self, other: &DefenseTable) {
        for (key, allowed) in &other.allowed {
            self.allowed.entry(key.clone()).or_insert(*allowed);
        }
    }

    pub fn points_allowed(&self, team: &str, position: Position) -> Option<f64> {
        self.allowed.get(&(team.to_ascii_uppercase(), position)).copied()
    }

    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

/// A news item attached to a player's external ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    /// External player ID the item is keyed by
    pub external_id: String,
    pub headline: String,
    pub body: String,
    pub published_at: DateTime<Utc>,
    /// Outlet or feed label, when known
    pub source: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_parsing() {
        assert_eq!("qb".parse::<Position>().unwrap(), Position::Qb);
        assert_eq!(" DEF ".parse::<Position>().unwrap(), Position::Def);
        assert_eq!("".parse::<Position>(), Err(SkipReason::MissingPosition));
        assert_eq!("DST".parse::<Position>(), Err(SkipReason::InvalidPosition("DST".to_string())));
        assert!("OL".parse::<Position>().is_err());
    }

    #[test]
    fn test_skip_samples_are_capped() {
        let mut feed: ParsedFeed<RawStatRecord> = ParsedFeed::new("stats");
        for line in 0..(MAX_SKIP_SAMPLES as u64 + 3) {
            feed.skip(line, SkipReason::MissingName, "x");
        }
        assert_eq!(feed.skipped, MAX_SKIP_SAMPLES + 3);
        assert_eq!(feed.samples.len(), MAX_SKIP_SAMPLES);
    }

    #[test]
    fn test_schedule_lookup_is_case_insensitive() {
        let table = ScheduleTable::from_entries(vec![ScheduleEntry {
            team: "WAS".to_string(),
            week: 3,
            opponent: ScheduledOpponent::Team("CIN".to_string()),
            home_away: Some(HomeAway::Away),
        }]);
        assert!(table.get("was", 3).is_some());
        assert!(table.get("WAS", 4).is_none());
    }
}
