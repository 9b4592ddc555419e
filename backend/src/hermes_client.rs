//! Price update sources
//!
//! Everything that produces raw accumulator bytes for the codec lives here:
//! the Hermes HTTP client (with retry), an offline file source, and a
//! fallback chain that tries sources in order. The file is only in the
//! chain when one is configured.
//!
//! ```text
//! [file replay] ──fail──▶ [Hermes primary] ──fail──▶ [Hermes fallback]
//!      │ok                       │ok                        │ok
//!      └──────▶ FetchedUpdate (payloads + metadata) ◀───────┘
//! ```

use crate::{
    codec::bytes_from_hex,
    error::{OracleError, Result},
    types::{FeedId, FeedMetadata},
};
use async_trait::async_trait;
use serde::Deserialize;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, warn};

pub const DEFAULT_HERMES_URL: &str = "https://hermes.pyth.network";

/// Raw update bytes plus whatever per-feed metadata the source provides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedUpdate {
    /// Accumulator update buffers, already converted from transport encoding
    pub payloads: Vec<Vec<u8>>,

    pub metadata: Vec<FeedMetadata>,
}

/// A place accumulator updates can be fetched from
#[async_trait]
pub trait PriceUpdateSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_update(&self, feed_ids: &[FeedId]) -> Result<FetchedUpdate>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,

    /// Delay before the first retry, doubled after each failure
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or retries are exhausted. The delay doubles after each failure.
    pub async fn run<T, F, Fut>(&self, target: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    attempt += 1;
                    warn!(
                        "Request to {} failed (attempt {}/{}): {}",
                        target,
                        attempt,
                        self.max_retries + 1,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(e) => {
                    error!(
                        "Request to {} failed after {} attempts: {}",
                        target,
                        attempt + 1,
                        e
                    );
                    return Err(e);
                }
            }
        }
    }
}

/// Transport failures, timeouts, 429 and 5xx responses are worth retrying.
/// Bad payloads and other 4xx answers will not change on a second request.
fn is_retryable(error: &OracleError) -> bool {
    match error {
        OracleError::HttpError(e) => match e.status() {
            Some(status) => {
                status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            None => !e.is_decode() && !e.is_builder(),
        },
        _ => false,
    }
}

// ============================================================================
// HERMES
// ============================================================================

/// Client for the Hermes price service
pub struct HermesClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HermesClient {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    fn latest_url(&self) -> String {
        format!("{}/v2/updates/price/latest", self.base_url)
    }

    /// Fetch the latest update for `feed_ids`, retrying with exponential backoff.
    pub async fn get_latest_update(&self, feed_ids: &[FeedId]) -> Result<FetchedUpdate> {
        if feed_ids.is_empty() {
            return Err(OracleError::InvalidInput("No feed ids requested".to_string()));
        }

        self.retry
            .run(&self.base_url, move || self.request_latest(feed_ids))
            .await
    }

    async fn request_latest(&self, feed_ids: &[FeedId]) -> Result<FetchedUpdate> {
        let mut query: Vec<(&str, String)> =
            feed_ids.iter().map(|id| ("ids[]", id.to_hex())).collect();
        query.push(("encoding", "hex".to_string()));
        query.push(("parsed", "true".to_string()));

        debug!("Fetching {} feeds from {}", feed_ids.len(), self.base_url);

        let response: HermesResponse = self
            .http
            .get(self.latest_url())
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let update = response.into_fetched()?;
        debug!(
            "Hermes returned {} payloads, {} parsed feeds",
            update.payloads.len(),
            update.metadata.len()
        );
        Ok(update)
    }
}

#[async_trait]
impl PriceUpdateSource for HermesClient {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn fetch_update(&self, feed_ids: &[FeedId]) -> Result<FetchedUpdate> {
        self.get_latest_update(feed_ids).await
    }
}

#[derive(Debug, Deserialize)]
struct HermesResponse {
    binary: BinaryUpdate,

    #[serde(default)]
    parsed: Vec<ParsedPriceUpdate>,
}

#[derive(Debug, Deserialize)]
struct BinaryUpdate {
    encoding: String,
    data: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ParsedPriceUpdate {
    id: String,

    #[serde(default)]
    metadata: Option<ParsedMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct ParsedMetadata {
    slot: Option<u64>,
    proof_available_time: Option<u64>,
    prev_publish_time: Option<u64>,
}

impl HermesResponse {
    fn into_fetched(self) -> Result<FetchedUpdate> {
        if self.binary.encoding != "hex" {
            return Err(OracleError::HermesError(format!(
                "Unexpected binary encoding: {}",
                self.binary.encoding
            )));
        }

        let payloads = self
            .binary
            .data
            .iter()
            .map(String::as_str)
            .map(bytes_from_hex)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let metadata = self
            .parsed
            .into_iter()
            .map(|parsed| -> Result<FeedMetadata> {
                let meta = parsed.metadata.unwrap_or_default();
                Ok(FeedMetadata {
                    feed_id: parsed.id.parse()?,
                    slot: meta.slot,
                    proof_available_time: meta.proof_available_time,
                    prev_publish_time: meta.prev_publish_time,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FetchedUpdate { payloads, metadata })
    }
}

// ============================================================================
// FILE REPLAY
// ============================================================================

/// Reads hex-encoded update payloads from a file, one per line.
///
/// Requested feed ids are ignored; the file is replayed as-is.
pub struct FileSource {
    path: PathBuf,
    name: String,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("file:{}", path.display());
        Self { path, name }
    }
}

#[async_trait]
impl PriceUpdateSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_update(&self, feed_ids: &[FeedId]) -> Result<FetchedUpdate> {
        let text = tokio::fs::read_to_string(&self.path).await?;

        let payloads = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(bytes_from_hex)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if payloads.is_empty() {
            return Err(OracleError::NoPriceData(format!(
                "{} contains no payloads",
                self.path.display()
            )));
        }

        debug!(
            "Loaded {} payloads from {} ({} feeds requested)",
            payloads.len(),
            self.path.display(),
            feed_ids.len()
        );

        Ok(FetchedUpdate {
            payloads,
            metadata: Vec::new(),
        })
    }
}

// ============================================================================
// FALLBACK CHAIN
// ============================================================================

/// Tries each source in order and returns the first success
pub struct FallbackSource {
    sources: Vec<Box<dyn PriceUpdateSource>>,
}

impl FallbackSource {
    pub fn new(sources: Vec<Box<dyn PriceUpdateSource>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl PriceUpdateSource for FallbackSource {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn fetch_update(&self, feed_ids: &[FeedId]) -> Result<FetchedUpdate> {
        let mut errors = Vec::new();

        for source in &self.sources {
            match source.fetch_update(feed_ids).await {
                Ok(update) => {
                    debug!("Fetched update from {}", source.name());
                    return Ok(update);
                }
                Err(e) => {
                    warn!("Source {} failed: {}", source.name(), e);
                    errors.push(format!("{}: {}", source.name(), e));
                }
            }
        }

        error!("All {} update sources failed", self.sources.len());
        Err(OracleError::NoPriceData(format!(
            "All sources failed: [{}]",
            errors.join("; ")
        )))
    }
}
