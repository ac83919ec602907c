//! Matchup context and situational signals

use feed_readers::{DefenseTable, NewsItem, ScheduleTable, ScheduledOpponent};
use tracing::debug;

use crate::benchmark::BenchmarkTable;
use crate::config::ContextConfig;
use crate::models::{
    Difficulty, InjuryFlag, MatchupContext, NewsFlag, Opponent, PlayerRecord, RedZoneRole, SituationalSignals,
};

/// Builds matchup context from the schedule and, when present, the
/// defense-vs-position table
pub struct ContextBuilder<'a> {
    schedule: &'a ScheduleTable,
    defense: Option<(&'a DefenseTable, &'a BenchmarkTable)>,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(schedule: &'a ScheduleTable) -> Self {
        Self { schedule, defense: None }
    }

    /// Rate matchups by the opponent's points allowed
    pub fn with_defense(mut self, defense: &'a DefenseTable, benchmarks: &'a BenchmarkTable) -> Self {
        self.defense = Some((defense, benchmarks));
        self
    }

    pub fn build(&self, record: &PlayerRecord, week: u32) -> MatchupContext {
        let team = record.identity.team.clone();
        let entry = team.as_deref().and_then(|team| self.schedule.get(team, week));

        let Some(entry) = entry else {
            debug!(player = %record.identity.display_name, ?team, week, "No schedule entry");
            return MatchupContext { team, week, opponent: Opponent::Unknown, home_away: None, difficulty: Difficulty::Unrated };
        };

        let (opponent, difficulty) = match &entry.opponent {
            ScheduledOpponent::Bye => (Opponent::Bye, Difficulty::Unrated),
            ScheduledOpponent::Team(opponent) => {
                let difficulty = self.difficulty(opponent, record);
                (Opponent::Team(opponent.clone()), difficulty)
            }
        };

        MatchupContext { team, week, opponent, home_away: entry.home_away, difficulty }
    }

    fn difficulty(&self, opponent: &str, record: &PlayerRecord) -> Difficulty {
        let position = record.identity.position;
        let Some((defense, benchmarks)) = self.defense else {
            return Difficulty::Unrated;
        };
        let Some(points_allowed) = defense.points_allowed(opponent, position) else {
            return Difficulty::Unrated;
        };
        match benchmarks.matchup(position, points_allowed) {
            Some((bucket, level)) => Difficulty::Rated { bucket, level, points_allowed },
            None => Difficulty::Unrated,
        }
    }
}

/// Matchup context from the schedule alone
pub fn build_context(record: &PlayerRecord, week: u32, schedule: &ScheduleTable) -> MatchupContext {
    ContextBuilder::new(schedule).build(record, week)
}

const INJURY_PHRASES: &[(&str, InjuryFlag)] = &[
    ("injured reserve", InjuryFlag::InjuredReserve),
    ("placed on ir", InjuryFlag::InjuredReserve),
    ("ruled out", InjuryFlag::Out),
    ("is out", InjuryFlag::Out),
    ("will be out", InjuryFlag::Out),
    ("out for", InjuryFlag::Out),
    ("listed as out", InjuryFlag::Out),
    ("will not play", InjuryFlag::Out),
    ("wont play", InjuryFlag::Out),
    ("doubtful", InjuryFlag::Doubtful),
    ("questionable", InjuryFlag::Questionable),
    ("game time decision", InjuryFlag::Questionable),
];

const ROLE_PHRASES: &[(&str, NewsFlag)] = &[
    ("suspended", NewsFlag::Suspended),
    ("suspension", NewsFlag::Suspended),
    ("traded", NewsFlag::Traded),
    ("released", NewsFlag::Released),
    ("waived", NewsFlag::Released),
];

/// Words that cancel a phrase when they appear shortly before it
const NEGATIONS: &[&str] = &["not", "no", "never", "wont", "isnt", "wasnt", "arent", "didnt", "doesnt", "avoids", "avoided"];

/// How many preceding words are checked for a negation
const NEGATION_WINDOW: usize = 4;

/// Lower-cased words; apostrophes are dropped so "won't" reads as "wont"
fn words(text: &str) -> Vec<String> {
    let mut cleaned = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\'' | '\u{2019}' => {}
            c if c.is_alphanumeric() => cleaned.extend(c.to_lowercase()),
            _ => cleaned.push(' '),
        }
    }
    cleaned.split_whitespace().map(str::to_string).collect()
}

/// Whether `phrase` occurs on word boundaries without a negation just before it
fn mentions(words: &[String], phrase: &str) -> bool {
    let phrase: Vec<&str> = phrase.split(' ').collect();
    words.windows(phrase.len()).enumerate().any(|(start, window)| {
        window.iter().zip(&phrase).all(|(word, expected)| word == expected)
            && !words[start.saturating_sub(NEGATION_WINDOW)..start]
                .iter()
                .any(|word| NEGATIONS.contains(&word.as_str()))
    })
}

/// Injury designation and role-change flags found in news headlines and bodies
pub fn scan_news(news: &[NewsItem]) -> (Option<InjuryFlag>, Vec<NewsFlag>) {
    let mut injury: Option<InjuryFlag> = None;
    let mut flags: Vec<NewsFlag> = Vec::new();

    for item in news {
        let text = words(&format!("{} {}", item.headline, item.body));
        for (phrase, flag) in INJURY_PHRASES {
            if mentions(&text, phrase) {
                injury = injury.max(Some(*flag));
            }
        }
        for (phrase, flag) in ROLE_PHRASES {
            if mentions(&text, phrase) && !flags.contains(flag) {
                flags.push(*flag);
            }
        }
    }

    flags.sort();
    (injury, flags)
}

/// Red-zone role from the first configured share stat present
pub fn red_zone_role(record: &PlayerRecord, config: &ContextConfig) -> (RedZoneRole, Option<f64>) {
    let Some(share) = config.red_zone_share_stats.iter().find_map(|stat| record.stat(stat)) else {
        return (RedZoneRole::Unknown, None);
    };

    let role = if share >= config.primary_share {
        RedZoneRole::Primary
    } else if share >= config.secondary_share {
        RedZoneRole::Secondary
    } else if share > 0.0 {
        RedZoneRole::Limited
    } else {
        RedZoneRole::Uninvolved
    };
    (role, Some(share))
}

/// Situational signals from a record's attached news and merged stats
pub fn derive_signals(record: &PlayerRecord, config: &ContextConfig) -> SituationalSignals {
    let (injury, news_flags) = scan_news(&record.news);
    let (red_zone_role, red_zone_share) = red_zone_role(record, config);
    SituationalSignals { injury, news_flags, red_zone_role, red_zone_share }
}
