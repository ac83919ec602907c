use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::error::{SkipReason, SourceError};
use crate::table;
use crate::types::{NewsItem, ParsedFeed};

/// Top level of a news dump: a bare array or an object wrapping one
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NewsPayload {
    Items(Vec<Value>),
    Wrapped {
        #[serde(alias = "news")]
        items: Vec<Value>,
    },
}

/// Player IDs arrive as strings from some outlets and numbers from others
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PlayerIdField {
    Text(String),
    Number(serde_json::Number),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TimestampField {
    Rfc3339(String),
    EpochSeconds(i64),
}

/// News item as it appears on the wire
#[derive(Debug, Deserialize)]
struct RawNewsItem {
    #[serde(default, alias = "playerId", alias = "external_id")]
    player_id: Option<PlayerIdField>,
    #[serde(default, alias = "title")]
    headline: Option<String>,
    #[serde(default, alias = "summary", alias = "description")]
    body: Option<String>,
    #[serde(default, alias = "publishedAt", alias = "timestamp", alias = "date")]
    published_at: Option<TimestampField>,
    #[serde(default, alias = "outlet")]
    source: Option<String>,
}

/// Reader for JSON news dumps.
///
/// Accepts a top-level array, or an object wrapping the array under `items`
/// or `news`. Each item needs a player ID, a headline and a timestamp
/// (RFC 3339 string or epoch seconds).
#[derive(Debug, Clone, Default)]
pub struct NewsReader;

impl NewsReader {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, source_id: &str, payload: &[u8]) -> Result<ParsedFeed<NewsItem>, SourceError> {
        let text = table::decode(source_id, payload)?;
        let root: Value = serde_json::from_str(text)
            .map_err(|error| SourceError::Json { source_id: source_id.to_string(), error })?;

        let items = match NewsPayload::deserialize(&root) {
            Ok(NewsPayload::Items(items)) | Ok(NewsPayload::Wrapped { items }) => items,
            Err(_) => {
                return Err(SourceError::Shape {
                    source_id: source_id.to_string(),
                    reason: "expected an array of news items".to_string(),
                })
            }
        };

        let mut feed = ParsedFeed::new(source_id);
        for (index, item) in items.iter().enumerate() {
            let position = index as u64 + 1;
            let parsed = RawNewsItem::deserialize(item)
                .map_err(|error| SkipReason::Malformed(error.to_string()))
                .and_then(RawNewsItem::into_news);
            match parsed {
                Ok(news) => feed.push(news),
                Err(reason) => feed.skip(position, reason, item.to_string()),
            }
        }

        info!(source = source_id, items = feed.len(), skipped = feed.skipped, "Parsed news feed");
        Ok(feed)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl RawNewsItem {
    fn into_news(self) -> Result<NewsItem, SkipReason> {
        let external_id = match self.player_id {
            Some(PlayerIdField::Text(id)) => non_empty(Some(id)),
            Some(PlayerIdField::Number(id)) => Some(id.to_string()),
            None => None,
        }
        .ok_or(SkipReason::MissingField("player_id"))?;
        let headline = non_empty(self.headline).ok_or(SkipReason::MissingField("headline"))?;

        let published_at = match self.published_at {
            Some(TimestampField::Rfc3339(raw)) => DateTime::parse_from_rfc3339(raw.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| SkipReason::InvalidTimestamp(raw))?,
            Some(TimestampField::EpochSeconds(secs)) => Utc
                .timestamp_opt(secs, 0)
                .single()
                .ok_or_else(|| SkipReason::InvalidTimestamp(secs.to_string()))?,
            None => return Err(SkipReason::MissingField("published_at")),
        };

        Ok(NewsItem {
            external_id,
            headline,
            body: non_empty(self.body).unwrap_or_default(),
            published_at,
            source: non_empty(self.source),
        })
    }
}
