use std::collections::BTreeMap;
use tracing::info;

use crate::coerce::{coerce_number, normalize_team, parse_number};
use crate::error::{SkipReason, SourceError};
use crate::table::{self, field, line_of, raw_of};
use crate::types::{ParsedFeed, Position, RawStatRecord};
use crate::StatReader;

const NAME: usize = 0;
const TEAM: usize = 1;
const BYE: usize = 2;
const POSITION: usize = 3;
const PPR_ADP: usize = 5;

/// Reader for ADP ranking files.
///
/// Columns are positional: name, team, bye week, position, (unused), PPR ADP.
/// A header row is detected when its ADP cell is not numeric. Positional
/// ranks glued to the position (`WR12`) are stripped.
#[derive(Debug, Clone, Default)]
pub struct AdpReader;

impl AdpReader {
    pub fn new() -> Self {
        Self
    }
}

/// "WR12" -> "WR"
fn strip_positional_rank(raw: &str) -> &str {
    raw.trim_end_matches(|c: char| c.is_ascii_digit())
}

impl StatReader for AdpReader {
    fn parse(&self, source_id: &str, payload: &[u8]) -> Result<ParsedFeed<RawStatRecord>, SourceError> {
        let text = table::decode(source_id, payload)?;
        let mut rdr = table::reader(text, false);

        let mut feed = ParsedFeed::new(source_id);
        for (index, result) in rdr.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    let line = e.position().map_or(0, |p| p.line());
                    feed.skip(line, SkipReason::Malformed(e.to_string()), "");
                    continue;
                }
            };
            if index == 0 && parse_number(field(&record, Some(PPR_ADP))).is_none() {
                // header row
                continue;
            }
            let line = line_of(&record);

            let name = field(&record, Some(NAME));
            if name.is_empty() {
                feed.skip(line, SkipReason::MissingName, raw_of(&record));
                continue;
            }
            let position = match strip_positional_rank(field(&record, Some(POSITION))).parse::<Position>() {
                Ok(position) => position,
                Err(reason) => {
                    feed.skip(line, reason, raw_of(&record));
                    continue;
                }
            };

            let mut stats = BTreeMap::new();
            stats.insert("adp_ppr".to_string(), coerce_number(field(&record, Some(PPR_ADP))));
            stats.insert("bye_week".to_string(), coerce_number(field(&record, Some(BYE))));

            feed.push(RawStatRecord {
                source: source_id.to_string(),
                name: name.to_string(),
                external_id: None,
                team: normalize_team(field(&record, Some(TEAM))),
                position,
                week: None,
                stats,
            });
        }

        info!(source = source_id, records = feed.len(), skipped = feed.skipped, "Parsed ADP feed");
        Ok(feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adp_with_header() {
        let csv = "\
Name,Team,Bye,POS,ESPN,AVG PPR
Ja'Marr Chase,CIN,10,WR1,1,1.4
Bijan Robinson,ATL,5,RB1,2,2.1
Some Kicker,DAL,10,K3,150,
Team Defense,PHI,9,DST1,140,141.0
,NYG,14,WR40,90,88.0
";
        let feed = AdpReader::new().parse("adp", csv.as_bytes()).unwrap();
        assert_eq!(feed.len(), 3);
        assert_eq!(feed.skipped, 2);

        let chase = &feed.items[0];
        assert_eq!(chase.position, Position::Wr);
        assert_eq!(chase.stat("adp_ppr"), Some(1.4));
        assert_eq!(chase.stat("bye_week"), Some(10.0));

        // Missing ADP cell coerces to zero rather than dropping the row
        let kicker = &feed.items[2];
        assert_eq!(kicker.position, Position::K);
        assert_eq!(kicker.stat("adp_ppr"), Some(0.0));
    }

    #[test]
    fn test_adp_without_header() {
        let csv = "Josh Allen,BUF,7,QB1,20,22.5\n";
        let feed = AdpReader::new().parse("adp", csv.as_bytes()).unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed.items[0].team.as_deref(), Some("BUF"));
    }

    #[test]
    fn test_strip_positional_rank() {
        assert_eq!(strip_positional_rank("WR12"), "WR");
        assert_eq!(strip_positional_rank("QB"), "QB");
    }
}
