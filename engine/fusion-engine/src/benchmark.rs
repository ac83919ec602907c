//! Position benchmarks and percentile scoring

use feed_readers::Position;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::info;

use crate::error::BenchmarkError;
use crate::models::{MatchupLevel, PercentileBucket, Rating, Score};

/// p25/p50/p75 cut points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
}

impl Percentiles {
    /// Boundary values round down into the lower bucket
    pub fn bucket(&self, value: f64) -> PercentileBucket {
        if value <= self.p25 {
            PercentileBucket::P25
        } else if value <= self.p50 {
            PercentileBucket::P50
        } else if value <= self.p75 {
            PercentileBucket::P75
        } else {
            PercentileBucket::P90
        }
    }

    fn is_ordered(&self) -> bool {
        [self.p25, self.p50, self.p75].iter().all(|v| v.is_finite()) && self.p25 <= self.p50 && self.p50 <= self.p75
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatBenchmark {
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,

    /// Lower values are better (e.g. interceptions)
    #[serde(default)]
    pub lower_is_better: bool,

    /// Percentiles are per game; season totals are divided by games played
    #[serde(default)]
    pub per_game: bool,
}

impl StatBenchmark {
    pub fn percentiles(&self) -> Percentiles {
        Percentiles { p25: self.p25, p50: self.p50, p75: self.p75 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionBenchmark {
    /// Fewer games than this cannot be rated
    pub min_games: u32,

    pub stats: BTreeMap<String, StatBenchmark>,

    /// Fantasy points allowed per game to this position by a defense
    #[serde(default)]
    pub defense: Option<Percentiles>,
}

/// Benchmark reference data, keyed by position
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BenchmarkTable {
    positions: HashMap<Position, PositionBenchmark>,
}

impl BenchmarkTable {
    pub fn new(positions: HashMap<Position, PositionBenchmark>) -> Result<Self, BenchmarkError> {
        let table = Self { positions };
        table.validate()?;
        Ok(table)
    }

    pub fn from_json_str(json: &str) -> Result<Self, BenchmarkError> {
        let table: BenchmarkTable = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, BenchmarkError> {
        let json = std::fs::read_to_string(path)
            .map_err(|error| BenchmarkError::Io { path: path.to_path_buf(), error })?;
        let table = Self::from_json_str(&json)?;
        info!(path = ?path, positions = table.positions.len(), "Loaded position benchmarks");
        Ok(table)
    }

    pub fn position(&self, position: Position) -> Option<&PositionBenchmark> {
        self.positions.get(&position)
    }

    pub fn stat(&self, position: Position, stat: &str) -> Option<&StatBenchmark> {
        self.position(position)?.stats.get(stat)
    }

    /// Rate a stat value against its position benchmark.
    ///
    /// The games floor is checked first, so a short sample is reported as
    /// insufficient for every stat regardless of value.
    pub fn score(
        &self,
        position: Position,
        stat: &str,
        value: f64,
        games_played: u32,
        lower_is_better: bool,
    ) -> Result<Score, BenchmarkError> {
        let benchmark = self.position(position).ok_or(BenchmarkError::UnknownPosition(position))?;

        if games_played < benchmark.min_games {
            return Ok(Score::InsufficientSample { games_played, min_games: benchmark.min_games });
        }

        let stat_benchmark = benchmark
            .stats
            .get(stat)
            .ok_or_else(|| BenchmarkError::UnknownStat { position, stat: stat.to_string() })?;

        let bucket = stat_benchmark.percentiles().bucket(value);
        Ok(Score::Rated(Rating::from_bucket(bucket, lower_is_better)))
    }

    /// Rate a stat with the direction stored in the benchmark data
    pub fn score_stat(&self, position: Position, stat: &str, value: f64, games_played: u32) -> Result<Score, BenchmarkError> {
        let lower_is_better = self.stat(position, stat).map(|s| s.lower_is_better).unwrap_or(false);
        self.score(position, stat, value, games_played, lower_is_better)
    }

    /// Matchup level for a defense's points allowed to a position; `None`
    /// when the position has no defense benchmark
    pub fn matchup(&self, position: Position, points_allowed: f64) -> Option<(PercentileBucket, MatchupLevel)> {
        let percentiles = self.position(position)?.defense?;
        let bucket = percentiles.bucket(points_allowed);
        let level = match bucket {
            PercentileBucket::P90 => MatchupLevel::Easy,
            PercentileBucket::P25 => MatchupLevel::Hard,
            _ => MatchupLevel::Neutral,
        };
        Some((bucket, level))
    }

    fn validate(&self) -> Result<(), BenchmarkError> {
        for (position, benchmark) in &self.positions {
            for (stat, stat_benchmark) in &benchmark.stats {
                if !stat_benchmark.percentiles().is_ordered() {
                    return Err(BenchmarkError::InvalidPercentiles { position: *position, stat: stat.clone() });
                }
            }
            if let Some(defense) = &benchmark.defense {
                if !defense.is_ordered() {
                    return Err(BenchmarkError::InvalidPercentiles { position: *position, stat: "defense".to_string() });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Color, Comparison};
    use std::io::Write;

    const BENCHMARKS: &str = r#"{
        "QB": {
            "min_games": 4,
            "stats": {
                "passing_yards": { "p25": 180, "p50": 235, "p75": 285, "per_game": true },
                "interceptions": { "p25": 0.5, "p50": 0.8, "p75": 1.1, "lower_is_better": true, "per_game": true }
            },
            "defense": { "p25": 15.0, "p50": 17.5, "p75": 20.0 }
        },
        "RB": {
            "min_games": 4,
            "stats": {
                "rushing_yards": { "p25": 35, "p50": 55, "p75": 80, "per_game": true }
            }
        }
    }"#;

    fn table() -> BenchmarkTable {
        BenchmarkTable::from_json_str(BENCHMARKS).unwrap()
    }

    fn rated(score: Score) -> Rating {
        *score.rating().expect("expected a rating")
    }

    #[test]
    fn test_passing_yards_boundaries() {
        let table = table();
        let score = |value| rated(table.score(Position::Qb, "passing_yards", value, 10, false).unwrap());

        assert_eq!(score(180.0).bucket, PercentileBucket::P25);
        assert_eq!(score(235.0).bucket, PercentileBucket::P50);
        assert_eq!(score(285.0).bucket, PercentileBucket::P75);

        let high = score(286.0);
        assert_eq!(high.bucket, PercentileBucket::P90);
        assert_eq!(high.comparison, Comparison::Above);

        let low = score(179.0);
        assert_eq!(low.bucket, PercentileBucket::P25);
        assert_eq!(low.comparison, Comparison::Below);
        assert_eq!(low.color, Color::Red);
    }

    #[test]
    fn test_interceptions_are_lower_is_better() {
        let table = table();

        let many = rated(table.score_stat(Position::Qb, "interceptions", 1.5, 10).unwrap());
        assert_eq!(many.bucket, PercentileBucket::P90);
        assert_eq!(many.color, Color::Red);
        assert_eq!(many.comparison, Comparison::Below);

        let few = rated(table.score_stat(Position::Qb, "interceptions", 0.2, 10).unwrap());
        assert_eq!(few.bucket, PercentileBucket::P25);
        assert_eq!(few.color, Color::Green);
        assert_eq!(few.comparison, Comparison::Above);
    }

    #[test]
    fn test_insufficient_sample_for_every_stat() {
        let table = table();
        for stat in ["passing_yards", "interceptions", "not_a_stat"] {
            for value in [0.0, 250.0, 10_000.0] {
                assert_eq!(
                    table.score(Position::Qb, stat, value, 3, false).unwrap(),
                    Score::InsufficientSample { games_played: 3, min_games: 4 }
                );
            }
        }
        // At the floor the stat is rated
        assert!(table.score(Position::Qb, "passing_yards", 250.0, 4, false).unwrap().rating().is_some());
    }

    #[test]
    fn test_unknown_lookups_are_errors() {
        let table = table();
        assert!(matches!(
            table.score(Position::Te, "receiving_yards", 50.0, 10, false),
            Err(BenchmarkError::UnknownPosition(Position::Te))
        ));
        assert!(matches!(
            table.score(Position::Rb, "passing_yards", 50.0, 10, false),
            Err(BenchmarkError::UnknownStat { position: Position::Rb, .. })
        ));
    }

    #[test]
    fn test_matchup_levels() {
        let table = table();
        assert_eq!(table.matchup(Position::Qb, 24.0), Some((PercentileBucket::P90, MatchupLevel::Easy)));
        assert_eq!(table.matchup(Position::Qb, 17.0), Some((PercentileBucket::P50, MatchupLevel::Neutral)));
        assert_eq!(table.matchup(Position::Qb, 12.0), Some((PercentileBucket::P25, MatchupLevel::Hard)));
        assert_eq!(table.matchup(Position::Rb, 30.0), None);
        assert_eq!(table.matchup(Position::K, 30.0), None);
    }

    #[test]
    fn test_unordered_percentiles_are_rejected() {
        let json = r#"{ "WR": { "min_games": 4, "stats": { "targets": { "p25": 9, "p50": 5, "p75": 7 } } } }"#;
        assert!(matches!(
            BenchmarkTable::from_json_str(json),
            Err(BenchmarkError::InvalidPercentiles { position: Position::Wr, .. })
        ));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BENCHMARKS.as_bytes()).unwrap();

        let table = BenchmarkTable::from_json_file(file.path()).unwrap();
        assert_eq!(table, self::table());
        assert!(table.stat(Position::Qb, "passing_yards").unwrap().per_game);

        let missing = BenchmarkTable::from_json_file(Path::new("/nonexistent/benchmarks.json"));
        assert!(matches!(missing, Err(BenchmarkError::Io { .. })));
    }
}
