use tracing::info;

use crate::coerce::{normalize_team, parse_number};
use crate::error::{SkipReason, SourceError};
use crate::table::{self, field, line_of, raw_of, Header};
use crate::types::{DefenseEntry, DefenseTable, ParsedFeed, Position};

const TEAM_COLUMNS: &[&str] = &["team", "defense", "tm"];
const POSITION_COLUMNS: &[&str] = &["position", "pos", "vs_position"];
const ALLOWED_COLUMNS: &[&str] = &["fantasy_points_allowed", "points_allowed", "fpa", "fpts_allowed"];

/// Reader for defense-vs-position tables: team, position, fantasy points
/// allowed per game to that position
#[derive(Debug, Clone, Default)]
pub struct DefenseReader;

impl DefenseReader {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, source_id: &str, payload: &[u8]) -> Result<ParsedFeed<DefenseEntry>, SourceError> {
        let text = table::decode(source_id, payload)?;
        let mut rdr = table::reader(text, true);
        let header = Header::read(source_id, &mut rdr)?;

        let team_col = header.require(source_id, TEAM_COLUMNS)?;
        let position_col = header.require(source_id, POSITION_COLUMNS)?;
        let allowed_col = header.require(source_id, ALLOWED_COLUMNS)?;

        let mut feed = ParsedFeed::new(source_id);
        for result in rdr.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    let line = e.position().map_or(0, |p| p.line());
                    feed.skip(line, SkipReason::Malformed(e.to_string()), "");
                    continue;
                }
            };
            let line = line_of(&record);

            let Some(team) = normalize_team(field(&record, Some(team_col))) else {
                feed.skip(line, SkipReason::MissingTeam, raw_of(&record));
                continue;
            };
            let position = match field(&record, Some(position_col)).parse::<Position>() {
                Ok(position) => position,
                Err(reason) => {
                    feed.skip(line, reason, raw_of(&record));
                    continue;
                }
            };
            // Not coerced to 0: a zero allowance would still rate the matchup
            let Some(points_allowed) = parse_number(field(&record, Some(allowed_col))) else {
                feed.skip(line, SkipReason::MissingField("points_allowed"), raw_of(&record));
                continue;
            };

            feed.push(DefenseEntry { team, position, points_allowed });
        }

        info!(source = source_id, entries = feed.len(), skipped = feed.skipped, "Parsed defense feed");
        Ok(feed)
    }

    pub fn parse_table(&self, source_id: &str, payload: &[u8]) -> Result<(DefenseTable, ParsedFeed<()>), SourceError> {
        let feed = self.parse(source_id, payload)?;
        let mut table = DefenseTable::new();
        let diagnostics = feed.map_items(|entries| {
            table.extend(entries);
            Vec::new()
        });
        Ok((table, diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defense_table() {
        let csv = "\
team,position,fantasy_points_allowed
CIN,RB,27.4
CIN,WR,38.1
SF,RB,
SF,OL,3.0
";
        let (table, diagnostics) = DefenseReader::new().parse_table("dvp", csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(diagnostics.skipped, 2);
        assert_eq!(table.points_allowed("CIN", Position::Rb), Some(27.4));
        assert_eq!(table.points_allowed("SF", Position::Rb), None);
    }
}
