use std::collections::BTreeMap;

use crate::config::ScoringConfig;
use crate::models::FantasyProjection;

/// Fantasy points from merged stats.
///
/// Returns `None` when no scoring stat is present. Per-game points are only
/// given when `games_played` is positive.
pub fn project(stats: &BTreeMap<String, f64>, scoring: &ScoringConfig) -> Option<FantasyProjection> {
    let mut total = 0.0;
    let mut scored = false;

    for (stat, value) in stats {
        if let Some(weight) = scoring.weight(stat) {
            total += value * weight;
            scored = true;
        }
    }

    if !scored {
        return None;
    }

    let per_game = stats.get("games_played").copied().filter(|games| *games > 0.0).map(|games| total / games);

    Some(FantasyProjection { total, per_game, scoring: scoring.format })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringFormat;

    fn stats(values: &[(&str, f64)]) -> BTreeMap<String, f64> {
        values.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_receiver_line_by_format() {
        let line = stats(&[("receptions", 6.0), ("receiving_yards", 85.0), ("receiving_tds", 1.0), ("games_played", 1.0)]);

        let ppr = project(&line, &ScoringConfig::for_format(ScoringFormat::Ppr)).unwrap();
        assert!(close(ppr.total, 6.0 + 8.5 + 6.0));
        assert_eq!(ppr.scoring, ScoringFormat::Ppr);

        let half = project(&line, &ScoringConfig::for_format(ScoringFormat::HalfPpr)).unwrap();
        assert!(close(half.total, 3.0 + 8.5 + 6.0));

        let standard = project(&line, &ScoringConfig::for_format(ScoringFormat::Standard)).unwrap();
        assert!(close(standard.total, 8.5 + 6.0));
    }

    #[test]
    fn test_quarterback_line() {
        let line = stats(&[
            ("passing_yards", 3000.0),
            ("passing_tds", 20.0),
            ("interceptions", 10.0),
            ("rushing_yards", 300.0),
            ("fumbles_lost", 2.0),
            ("passing_2pt_conversions", 1.0),
            ("games_played", 10.0),
        ]);
        let projection = project(&line, &ScoringConfig::default()).unwrap();
        let expected = 120.0 + 80.0 - 20.0 + 30.0 - 4.0 + 2.0;
        assert!(close(projection.total, expected));
        assert!(close(projection.per_game.unwrap(), expected / 10.0));
    }

    #[test]
    fn test_per_game_requires_games() {
        let projection = project(&stats(&[("rushing_yards", 50.0)]), &ScoringConfig::default()).unwrap();
        assert!(close(projection.total, 5.0));
        assert_eq!(projection.per_game, None);

        let zero = project(&stats(&[("rushing_yards", 50.0), ("games_played", 0.0)]), &ScoringConfig::default()).unwrap();
        assert_eq!(zero.per_game, None);
    }

    #[test]
    fn test_no_scoring_stats() {
        assert_eq!(project(&stats(&[("adp_ppr", 12.5), ("games_played", 8.0)]), &ScoringConfig::default()), None);
        assert_eq!(project(&BTreeMap::new(), &ScoringConfig::default()), None);
    }
}
