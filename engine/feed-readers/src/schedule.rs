use tracing::info;

use crate::coerce::{normalize_team, parse_week};
use crate::error::{SkipReason, SourceError};
use crate::table::{self, field, line_of, raw_of, Header};
use crate::types::{HomeAway, ParsedFeed, ScheduleEntry, ScheduleTable, ScheduledOpponent};

const TEAM_COLUMNS: &[&str] = &["team", "tm"];
const WEEK_COLUMNS: &[&str] = &["week", "wk"];
const OPPONENT_COLUMNS: &[&str] = &["opponent", "opp"];
const HOME_AWAY_COLUMNS: &[&str] = &["home_away", "location", "site", "venue"];

/// Reader for weekly schedule files: team, week, opponent, home/away
#[derive(Debug, Clone, Default)]
pub struct ScheduleReader;

impl ScheduleReader {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, source_id: &str, payload: &[u8]) -> Result<ParsedFeed<ScheduleEntry>, SourceError> {
        let text = table::decode(source_id, payload)?;
        let mut rdr = table::reader(text, true);
        let header = Header::read(source_id, &mut rdr)?;

        let team_col = header.require(source_id, TEAM_COLUMNS)?;
        let week_col = header.require(source_id, WEEK_COLUMNS)?;
        let opponent_col = header.require(source_id, OPPONENT_COLUMNS)?;
        let home_away_col = header.find(HOME_AWAY_COLUMNS);

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
            let week = match parse_week(field(&record, Some(week_col))) {
                Ok(Some(week)) => week,
                Ok(None) => {
                    feed.skip(line, SkipReason::MissingField("week"), raw_of(&record));
                    continue;
                }
                Err(reason) => {
                    feed.skip(line, reason, raw_of(&record));
                    continue;
                }
            };
            let raw_opponent = field(&record, Some(opponent_col));
            if raw_opponent.is_empty() {
                feed.skip(line, SkipReason::MissingField("opponent"), raw_of(&record));
                continue;
            }

            let (opponent, implied_away) = parse_opponent(raw_opponent);
            let home_away = match opponent {
                ScheduledOpponent::Bye => None,
                ScheduledOpponent::Team(_) => {
                    parse_home_away(field(&record, home_away_col)).or(implied_away.then_some(HomeAway::Away))
                }
            };

            feed.push(ScheduleEntry { team, week, opponent, home_away });
        }

        info!(source = source_id, entries = feed.len(), skipped = feed.skipped, "Parsed schedule feed");
        Ok(feed)
    }

    /// Parse straight into a lookup table
    pub fn parse_table(&self, source_id: &str, payload: &[u8]) -> Result<(ScheduleTable, ParsedFeed<()>), SourceError> {
        let feed = self.parse(source_id, payload)?;
        let mut table = ScheduleTable::new();
        let diagnostics = feed.map_items(|entries| {
            table.extend(entries);
            Vec::new()
        });
        Ok((table, diagnostics))
    }
}

/// "@DAL" means away at DAL; "BYE" means no game
fn parse_opponent(raw: &str) -> (ScheduledOpponent, bool) {
    let upper = raw.to_ascii_uppercase();
    if upper == "BYE" {
        return (ScheduledOpponent::Bye, false);
    }
    match upper.strip_prefix('@') {
        Some(team) => (ScheduledOpponent::Team(team.trim().to_string()), true),
        None => (ScheduledOpponent::Team(upper), false),
    }
}

fn parse_home_away(raw: &str) -> Option<HomeAway> {
    match raw.to_ascii_lowercase().as_str() {
        "h" | "home" | "vs" => Some(HomeAway::Home),
        "a" | "away" | "@" | "at" => Some(HomeAway::Away),
        _ => None,
    }
}
