use async_trait::async_trait;
use feed_readers::{FeedSource, NewsItem, NewsReader, SourceError};
use std::collections::HashMap;
use tracing::info;

/// Queryable news keyed by external player ID
#[async_trait]
pub trait NewsStore: Send + Sync {
    /// News for one external ID, newest first
    async fn news_for(&self, external_id: &str) -> Result<Vec<NewsItem>, SourceError>;
}

/// News store held in memory, built from a parsed news feed
#[derive(Debug, Clone, Default)]
pub struct InMemoryNewsStore {
    by_player: HashMap<String, Vec<NewsItem>>,
    limit: Option<usize>,
}

impl InMemoryNewsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: impl IntoIterator<Item = NewsItem>) -> Self {
        let mut store = Self::new();
        store.extend(items);
        store
    }

    /// Fetch and parse a news feed into a store
    pub async fn load(source: &dyn FeedSource) -> Result<Self, SourceError> {
        let payload = source.fetch().await?;
        let feed = NewsReader::new().parse(source.id(), &payload)?;
        let store = Self::from_items(feed.items);
        info!(source = source.id(), players = store.by_player.len(), "Loaded news store");
        Ok(store)
    }

    /// Cap the number of items returned per player
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = NewsItem>) {
        for item in items {
            self.by_player.entry(item.external_id.clone()).or_default().push(item);
        }
        for items in self.by_player.values_mut() {
            items.sort_by(|a, b| b.published_at.cmp(&a.published_at).then_with(|| a.headline.cmp(&b.headline)));
            items.dedup();
        }
    }

    pub fn len(&self) -> usize {
        self.by_player.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_player.is_empty()
    }
}

#[async_trait]
impl NewsStore for InMemoryNewsStore {
    async fn news_for(&self, external_id: &str) -> Result<Vec<NewsItem>, SourceError> {
        let mut items = self.by_player.get(external_id).cloned().unwrap_or_default();
        if let Some(limit) = self.limit {
            items.truncate(limit);
        }
        Ok(items)
    }
}
