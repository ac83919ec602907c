use std::collections::BTreeMap;
use tracing::info;

use crate::coerce::{coerce_number, normalize_team};
use crate::error::{SkipReason, SourceError};
use crate::table::{self, field, line_of, raw_of, Header};
use crate::types::{ParsedFeed, Position, RawStatRecord};
use crate::StatReader;

const NAME_COLUMNS: &[&str] = &["player", "name", "player_name"];
const TEAM_COLUMNS: &[&str] = &["team", "tm"];
const IGNORED_COLUMNS: &[&str] = &["player", "name", "player_name", "team", "tm", "rank", "rk", "pos", "position"];

/// Reader for reports keyed by player name, one file per position group
/// (red-zone usage, market share). The position comes from the reader,
/// not the file; stat columns get the reader's prefix.
#[derive(Debug, Clone)]
pub struct NameKeyedReader {
    position: Position,
    prefix: String,
}

impl NameKeyedReader {
    pub fn new(position: Position, prefix: impl Into<String>) -> Self {
        Self { position, prefix: prefix.into() }
    }

    /// Red-zone report for one position group (`rz_` stats)
    pub fn red_zone(position: Position) -> Self {
        Self::new(position, "rz_")
    }

    /// Market-share report for one position group (`ms_` stats)
    pub fn market_share(position: Position) -> Self {
        Self::new(position, "ms_")
    }

    pub fn position(&self) -> Position {
        self.position
    }

    fn stat_name(&self, key: &str) -> String {
        if key.starts_with(&self.prefix) {
            key.to_string()
        } else {
            format!("{}{}", self.prefix, key)
        }
    }
}

impl StatReader for NameKeyedReader {
    fn parse(&self, source_id: &str, payload: &[u8]) -> Result<ParsedFeed<RawStatRecord>, SourceError> {
        let text = table::decode(source_id, payload)?;
        let mut rdr = table::reader(text, true);
        let header = Header::read(source_id, &mut rdr)?;

        let name_col = header.require(source_id, NAME_COLUMNS)?;
        let team_col = header.find(TEAM_COLUMNS);
        let stat_cols: Vec<(usize, String)> = header
            .keys()
            .filter(|(_, key)| !key.is_empty() && !IGNORED_COLUMNS.contains(key))
            .map(|(i, key)| (i, self.stat_name(key)))
            .collect();

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
            let name = field(&record, Some(name_col));
            if name.is_empty() {
                feed.skip(line_of(&record), SkipReason::MissingName, raw_of(&record));
                continue;
            }

            let stats: BTreeMap<String, f64> = stat_cols
                .iter()
                .map(|(col, stat)| (stat.clone(), coerce_number(field(&record, Some(*col)))))
                .collect();

            feed.push(RawStatRecord {
                source: source_id.to_string(),
                name: name.to_string(),
                external_id: None,
                team: normalize_team(field(&record, team_col)),
                position: self.position,
                week: None,
                stats,
            });
        }

        info!(
            source = source_id,
            position = %self.position,
            records = feed.len(),
            skipped = feed.skipped,
            "Parsed name-keyed feed"
        );
        Ok(feed)
    }
}
