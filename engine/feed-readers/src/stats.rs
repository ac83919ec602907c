use std::collections::BTreeMap;
use tracing::info;

use crate::coerce::{coerce_number, normalize_team, parse_week};
use crate::error::{SkipReason, SourceError};
use crate::table::{self, field, line_of, raw_of, Header};
use crate::types::{ParsedFeed, Position, RawStatRecord};
use crate::StatReader;

const NAME_COLUMNS: &[&str] = &["player_display_name", "player_name", "name", "player"];
const ID_COLUMNS: &[&str] = &["player_id", "gsis_id"];
const TEAM_COLUMNS: &[&str] = &["recent_team", "team"];
const POSITION_COLUMNS: &[&str] = &["position", "pos"];
const WEEK_COLUMNS: &[&str] = &["week"];
const GAMES_COLUMNS: &[&str] = &["games", "games_played", "g"];

/// Columns that describe the row rather than measure the player
const METADATA_COLUMNS: &[&str] = &[
    "player_display_name",
    "player_name",
    "name",
    "player",
    "player_id",
    "gsis_id",
    "recent_team",
    "team",
    "position",
    "pos",
    "position_group",
    "season",
    "season_type",
    "week",
    "opponent_team",
    "headshot_url",
];

/// Reader for season (or weekly) stat tables with a header row.
///
/// Every non-metadata column is treated as a numeric stat; `games` is
/// renamed to `games_played`.
#[derive(Debug, Clone, Default)]
pub struct SeasonStatsReader;

impl SeasonStatsReader {
    pub fn new() -> Self {
        Self
    }
}

impl StatReader for SeasonStatsReader {
    fn parse(&self, source_id: &str, payload: &[u8]) -> Result<ParsedFeed<RawStatRecord>, SourceError> {
        let text = table::decode(source_id, payload)?;
        let mut rdr = table::reader(text, true);
        let header = Header::read(source_id, &mut rdr)?;

        let name_col = header.require(source_id, NAME_COLUMNS)?;
        let position_col = header.require(source_id, POSITION_COLUMNS)?;
        let id_col = header.find(ID_COLUMNS);
        let team_col = header.find(TEAM_COLUMNS);
        let week_col = header.find(WEEK_COLUMNS);
        let games_col = header.find(GAMES_COLUMNS);

        let stat_cols: Vec<(usize, String)> = header
            .keys()
            .filter(|(i, key)| {
                Some(*i) != games_col && !key.is_empty() && !METADATA_COLUMNS.contains(key)
            })
            .map(|(i, key)| (i, key.to_string()))
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
            let line = line_of(&record);

            let name = field(&record, Some(name_col));
            if name.is_empty() {
                feed.skip(line, SkipReason::MissingName, raw_of(&record));
                continue;
            }
            let position = match field(&record, Some(position_col)).parse::<Position>() {
                Ok(position) => position,
                Err(reason) => {
                    feed.skip(line, reason, raw_of(&record));
                    continue;
                }
            };
            let week = match parse_week(field(&record, week_col)) {
                Ok(week) => week,
                Err(reason) => {
                    feed.skip(line, reason, raw_of(&record));
                    continue;
                }
            };

            let mut stats = BTreeMap::new();
            if games_col.is_some() {
                stats.insert("games_played".to_string(), coerce_number(field(&record, games_col)));
            }
            for (col, key) in &stat_cols {
                stats.insert(key.clone(), coerce_number(field(&record, Some(*col))));
            }

            let external_id = field(&record, id_col);
            feed.push(RawStatRecord {
                source: source_id.to_string(),
                name: name.to_string(),
                external_id: (!external_id.is_empty()).then(|| external_id.to_string()),
                team: normalize_team(field(&record, team_col)),
                position,
                week,
                stats,
            });
        }

        info!(
            source = source_id,
            records = feed.len(),
            skipped = feed.skipped,
            "Parsed season stats feed"
        );
        Ok(feed)
    }
}
