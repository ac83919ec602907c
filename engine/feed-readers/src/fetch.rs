use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::error::SourceError;

/// Where a feed's bytes live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedLocation {
    /// Remotely hosted file fetched over HTTP(S)
    Url { url: String },
    /// Local file
    Path { path: PathBuf },
}

/// Anything that can hand over a feed's raw payload
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Source ID used in records and diagnostics
    fn id(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<u8>, SourceError>;
}

/// HTTP and file fetcher shared by all configured sources
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    /// Create a new fetcher with the given request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fusion-engine/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    pub async fn fetch(&self, source_id: &str, location: &FeedLocation) -> Result<Vec<u8>, SourceError> {
        match location {
            FeedLocation::Url { url } => self.fetch_url(source_id, url).await,
            FeedLocation::Path { path } => {
                debug!(source = source_id, ?path, "Reading local feed");
                tokio::fs::read(path).await.map_err(|error| SourceError::Io {
                    source_id: source_id.to_string(),
                    path: path.clone(),
                    error,
                })
            }
        }
    }

    async fn fetch_url(&self, source_id: &str, url: &str) -> Result<Vec<u8>, SourceError> {
        info!(source = source_id, url, "Fetching remote feed");

        let http_error = |reason: String| SourceError::Http { source_id: source_id.to_string(), reason };

        let response = self.client.get(url).send().await.map_err(|e| http_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(http_error(format!("HTTP request failed with status: {}", response.status())));
        }
        let body = response.bytes().await.map_err(|e| http_error(e.to_string()))?;

        info!(source = source_id, bytes = body.len(), "Fetched remote feed");
        Ok(body.to_vec())
    }
}

/// A source backed by a configured location
pub struct ConfiguredSource {
    id: String,
    location: FeedLocation,
    fetcher: Arc<FeedFetcher>,
}

impl ConfiguredSource {
    pub fn new(id: impl Into<String>, location: FeedLocation, fetcher: Arc<FeedFetcher>) -> Self {
        Self { id: id.into(), location, fetcher }
    }

    pub fn location(&self) -> &FeedLocation {
        &self.location
    }
}

#[async_trait]
impl FeedSource for ConfiguredSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self) -> Result<Vec<u8>, SourceError> {
        self.fetcher.fetch(&self.id, &self.location).await
    }
}

/// A source whose payload is already in memory (e.g. read from a datastore)
#[derive(Debug, Clone)]
pub struct StaticSource {
    id: String,
    payload: Vec<u8>,
}

impl StaticSource {
    pub fn new(id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self { id: id.into(), payload: payload.into() }
    }
}

#[async_trait]
impl FeedSource for StaticSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self) -> Result<Vec<u8>, SourceError> {
        Ok(self.payload.clone())
    }
}

/// Caller-supplied bound on concurrent feed fetches
#[derive(Debug, Clone)]
pub struct FetchLimiter {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl FetchLimiter {
    pub fn new(max_concurrent: usize) -> Self {
        let limit = max_concurrent.max(1);
        Self { permits: Arc::new(Semaphore::new(limit)), limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `fut` once a permit is free. The permit is released when `fut`
    /// completes or is dropped.
    pub async fn run<F, T>(&self, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = self.permits.acquire().await.ok();
        fut.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_local_file_fetch() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "team,week,opponent").unwrap();

        let fetcher = Arc::new(FeedFetcher::new(Duration::from_secs(5)).unwrap());
        let source = ConfiguredSource::new(
            "schedule",
            FeedLocation::Path { path: file.path().to_path_buf() },
            fetcher,
        );
        let bytes = source.fetch().await.unwrap();
        assert!(bytes.starts_with(b"team,week"));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let fetcher = FeedFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher
            .fetch("adp", &FeedLocation::Path { path: PathBuf::from("/definitely/not/here.csv") })
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
        assert_eq!(err.source_id(), "adp");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_limiter_bounds_concurrency() {
        let limiter = FetchLimiter::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    limiter
                        .run(async {
                            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                        })
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(limiter.available(), 2);
    }

    #[test]
    fn test_static_source_hands_back_payload() {
        let source = StaticSource::new("news", "[]");
        assert_eq!(source.id(), "news");
        assert_eq!(tokio_test::block_on(source.fetch()).unwrap(), b"[]".to_vec());
    }

    #[test]
    fn test_location_serde() {
        let location: FeedLocation = serde_json::from_str(r#"{"type":"url","url":"https://example.com/a.csv"}"#).unwrap();
        assert_eq!(location, FeedLocation::Url { url: "https://example.com/a.csv".to_string() });
    }
}
