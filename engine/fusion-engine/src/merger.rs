use feed_readers::RawStatRecord;
use player_registry::PlayerIdentity;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::error::MergeError;
use crate::models::{Discrepancy, PlayerRecord, StatScope};

/// Values this close are treated as agreeing
pub const AGREEMENT_TOLERANCE: f64 = 1e-6;

/// Total order over source names for conflict resolution.
///
/// Listed sources rank by list position; unlisted sources rank after every
/// listed one, ordered by name.
#[derive(Debug, Clone, Default)]
pub struct SourcePriority {
    ranks: HashMap<String, usize>,
}

impl SourcePriority {
    pub fn new<I, S>(order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ranks = HashMap::new();
        for (rank, source) in order.into_iter().enumerate() {
            // First listing wins
            ranks.entry(source.into()).or_insert(rank);
        }
        Self { ranks }
    }

    pub fn rank(&self, source: &str) -> Option<usize> {
        self.ranks.get(source).copied()
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match (self.rank(a), self.rank(b)) {
            (Some(a_rank), Some(b_rank)) => a_rank.cmp(&b_rank),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    }
}

/// One source's value for a stat
#[derive(Debug, Clone, Copy)]
struct Reporter<'a> {
    source: &'a str,
    value: f64,
    scope: StatScope,
}

/// Merge every source's stats for one identity into a single record.
///
/// Week rows shadow season rows reporting the same stat; season rows fill in
/// what the week rows lack. Within a scope the winner is the highest-priority
/// reporter (ties within a source broken by value), so the result does not
/// depend on record order.
pub fn merge(
    identity: &PlayerIdentity,
    week: Option<u32>,
    records: &[RawStatRecord],
    priority: &SourcePriority,
) -> Result<PlayerRecord, MergeError> {
    let mut reporters: BTreeMap<&str, Vec<Reporter<'_>>> = BTreeMap::new();

    for record in records {
        if record.position != identity.position {
            return Err(MergeError::PositionMismatch {
                source_id: record.source.clone(),
                expected: identity.position,
                found: record.position,
            });
        }
        let scope = StatScope::of(record.week);
        for (stat, value) in &record.stats {
            reporters.entry(stat.as_str()).or_default().push(Reporter {
                source: record.source.as_str(),
                value: *value,
                scope,
            });
        }
    }

    let mut merged = PlayerRecord::new(identity.clone(), week);

    for (stat, mut values) in reporters {
        values.sort_by(|a, b| {
            a.scope
                .cmp(&b.scope)
                .then_with(|| priority.compare(a.source, b.source))
                .then_with(|| a.value.total_cmp(&b.value))
        });

        let accepted = values[0];
        for reporter in &values[1..] {
            if reporter.scope != accepted.scope {
                // Sorted: the first season reporter is the shadowed season value
                merged.shadowed_season_stats.entry(stat.to_string()).or_insert(reporter.value);
                continue;
            }
            if (reporter.value - accepted.value).abs() <= AGREEMENT_TOLERANCE {
                continue;
            }
            if reporter.source == accepted.source {
                debug!(stat, source = reporter.source, value = reporter.value, "Duplicate row within one source");
                continue;
            }
            merged.discrepancies.push(Discrepancy {
                stat: stat.to_string(),
                rejected: reporter.value,
                source: reporter.source.to_string(),
                accepted: accepted.value,
                accepted_source: accepted.source.to_string(),
            });
        }

        merged.stats.insert(stat.to_string(), accepted.value);
        merged.stat_sources.insert(stat.to_string(), accepted.source.to_string());
        merged.stat_scopes.insert(stat.to_string(), accepted.scope);
    }

    if !merged.discrepancies.is_empty() {
        debug!(
            player = %identity.display_name,
            discrepancies = merged.discrepancies.len(),
            "Resolved conflicting stats by source priority"
        );
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_readers::Position;
    use player_registry::PlayerId;

    fn identity() -> PlayerIdentity {
        PlayerIdentity {
            id: PlayerId(7),
            normalized_name: "brian robinson".to_string(),
            display_name: "Brian Robinson Jr.".to_string(),
            position: Position::Rb,
            team: Some("WAS".to_string()),
            external_ids: Default::default(),
        }
    }

    fn record(source: &str, stats: &[(&str, f64)]) -> RawStatRecord {
        scoped(source, Some(3), stats)
    }

    fn scoped(source: &str, week: Option<u32>, stats: &[(&str, f64)]) -> RawStatRecord {
        RawStatRecord {
            source: source.to_string(),
            name: "Brian Robinson".to_string(),
            external_id: None,
            team: Some("WAS".to_string()),
            position: Position::Rb,
            week,
            stats: stats.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn test_agreement_keeps_first_source_without_discrepancy() {
        let records = vec![record("A", &[("rushing_attempts", 24.0)]), record("B", &[("rushing_attempts", 24.0)])];
        let merged = merge(&identity(), Some(3), &records, &SourcePriority::new(["A", "B"])).unwrap();

        assert_eq!(merged.stat("rushing_attempts"), Some(24.0));
        assert_eq!(merged.stat_sources["rushing_attempts"], "A");
        assert!(merged.discrepancies.is_empty());
    }

    #[test]
    fn test_conflict_takes_priority_and_records_discrepancy() {
        let records = vec![record("B", &[("rushing_tds", 6.0)]), record("A", &[("rushing_tds", 7.0)])];
        let merged = merge(&identity(), Some(3), &records, &SourcePriority::new(["A", "B"])).unwrap();

        assert_eq!(merged.stat("rushing_tds"), Some(7.0));
        assert_eq!(merged.stat_sources["rushing_tds"], "A");
        assert_eq!(
            merged.discrepancies,
            vec![Discrepancy {
                stat: "rushing_tds".to_string(),
                rejected: 6.0,
                source: "B".to_string(),
                accepted: 7.0,
                accepted_source: "A".to_string(),
            }]
        );
    }

    #[test]
    fn test_values_within_tolerance_agree() {
        let records = vec![record("A", &[("ms_target_share", 21.5)]), record("B", &[("ms_target_share", 21.5000001)])];
        let merged = merge(&identity(), None, &records, &SourcePriority::new(["B", "A"])).unwrap();
        assert_eq!(merged.stat("ms_target_share"), Some(21.5000001));
        assert!(merged.discrepancies.is_empty());
    }

    #[test]
    fn test_absent_stats_are_omitted_and_zero_is_kept() {
        let records = vec![record("A", &[("rushing_yards", 0.0)])];
        let merged = merge(&identity(), Some(3), &records, &SourcePriority::default()).unwrap();
        assert_eq!(merged.stat("rushing_yards"), Some(0.0));
        assert_eq!(merged.stat("receiving_yards"), None);
        assert!(!merged.stats.contains_key("receiving_yards"));
    }

    #[test]
    fn test_unlisted_sources_rank_after_listed_by_name() {
        let priority = SourcePriority::new(["listed"]);
        assert_eq!(priority.compare("listed", "aaa"), Ordering::Less);
        assert_eq!(priority.compare("zzz", "aaa"), Ordering::Greater);

        let records = vec![
            record("zeta", &[("receptions", 3.0)]),
            record("alpha", &[("receptions", 4.0)]),
            record("listed", &[("receptions", 5.0)]),
        ];
        let merged = merge(&identity(), None, &records, &priority).unwrap();
        assert_eq!(merged.stat("receptions"), Some(5.0));
        let losers: Vec<&str> = merged.discrepancies.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(losers, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let base = vec![
            record("A", &[("rushing_tds", 7.0), ("rushing_yards", 410.0)]),
            record("B", &[("rushing_tds", 6.0), ("receptions", 12.0)]),
            record("C", &[("rushing_yards", 405.0), ("receptions", 12.0)]),
            // Same source twice with different values: tie broken by value
            record("C", &[("rushing_tds", 5.0)]),
            record("C", &[("rushing_tds", 4.0)]),
        ];
        let priority = SourcePriority::new(["A", "B"]);
        let expected = merge(&identity(), Some(3), &base, &priority).unwrap();

        // Rotations and reversals of the input
        for shift in 0..base.len() {
            let mut rotated = base.clone();
            rotated.rotate_left(shift);
            for input in [rotated.clone(), rotated.into_iter().rev().collect()] {
                let merged = merge(&identity(), Some(3), &input, &priority).unwrap();
                assert_eq!(merged.stats, expected.stats);
                assert_eq!(merged.stat_sources, expected.stat_sources);
                assert_eq!(merged.discrepancies, expected.discrepancies);
            }
        }
        assert_eq!(expected.stat("rushing_yards"), Some(410.0));
        assert_eq!(expected.stat_sources["receptions"], "B");
    }

    #[test]
    fn test_week_rows_shadow_season_rows() {
        let records = vec![
            scoped("s", None, &[("games_played", 10.0), ("rushing_yards", 700.0), ("receptions", 20.0)]),
            scoped("s", Some(3), &[("games_played", 1.0), ("rushing_yards", 88.0)]),
        ];
        let merged = merge(&identity(), Some(3), &records, &SourcePriority::default()).unwrap();

        assert_eq!(merged.stat("rushing_yards"), Some(88.0));
        assert_eq!(merged.scope("rushing_yards"), Some(StatScope::Week));
        assert_eq!(merged.stat("receptions"), Some(20.0));
        assert_eq!(merged.scope("receptions"), Some(StatScope::Season));
        assert_eq!(merged.shadowed_season_stats["rushing_yards"], 700.0);
        assert_eq!(merged.games_played(), 10.0);
        assert!(merged.discrepancies.is_empty());
    }

    #[test]
    fn test_week_value_wins_over_higher_priority_season_value() {
        let records = vec![
            scoped("season", None, &[("rushing_yards", 700.0)]),
            scoped("weekly", Some(3), &[("rushing_yards", 88.0)]),
        ];
        let merged = merge(&identity(), Some(3), &records, &SourcePriority::new(["season", "weekly"])).unwrap();

        assert_eq!(merged.stat("rushing_yards"), Some(88.0));
        assert_eq!(merged.stat_sources["rushing_yards"], "weekly");
        assert!(merged.discrepancies.is_empty());
    }

    #[test]
    fn test_source_never_conflicts_with_itself() {
        let records = vec![record("A", &[("rushing_tds", 1.0)]), record("A", &[("rushing_tds", 2.0)])];
        let merged = merge(&identity(), Some(3), &records, &SourcePriority::default()).unwrap();

        assert_eq!(merged.stat("rushing_tds"), Some(1.0));
        assert!(merged.discrepancies.iter().all(|d| d.source != d.accepted_source));
        assert!(merged.discrepancies.is_empty());
    }

    #[test]
    fn test_position_mismatch_is_rejected() {
        let mut wrong = record("A", &[("receptions", 3.0)]);
        wrong.position = Position::Wr;
        let err = merge(&identity(), None, &[wrong], &SourcePriority::default()).unwrap_err();
        assert_eq!(
            err,
            MergeError::PositionMismatch { source_id: "A".to_string(), expected: Position::Rb, found: Position::Wr }
        );
    }
}
