use crate::{codec::EntryPoint, hermes_client::DEFAULT_HERMES_URL, types::FeedId};
use anyhow::{anyhow, Context};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Primary Hermes endpoint
    pub hermes_url: String,

    /// Secondary Hermes endpoint, tried when the primary fails
    pub hermes_fallback_url: Option<String>,

    /// Hex payload file replayed instead of fetching (tried first)
    pub update_file: Option<PathBuf>,

    /// Feeds to request
    pub feed_ids: Vec<FeedId>,

    /// Indices into the decoded records to re-encode; `None` selects all
    pub selected_indices: Option<Vec<usize>>,

    /// Entry point the calldata targets
    pub entry_point: EntryPoint,

    /// Fetch settings
    pub fetch_config: FetchConfig,

    /// Where to write the JSON report, if anywhere
    pub report_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Retries after the first failed request
    pub max_retries: u32,

    /// Initial backoff between retries (milliseconds)
    pub retry_delay_ms: u64,

    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| var(key).filter(|value| !value.trim().is_empty());

        Ok(Config {
            hermes_url: non_empty("HERMES_URL")
                .unwrap_or_else(|| DEFAULT_HERMES_URL.to_string()),
            hermes_fallback_url: non_empty("HERMES_FALLBACK_URL"),
            update_file: non_empty("UPDATE_FILE").map(PathBuf::from),
            feed_ids: parse_feed_ids(
                &non_empty("FEED_IDS").ok_or_else(|| anyhow!("FEED_IDS must be set"))?,
            )?,
            selected_indices: non_empty("SELECTED_INDICES")
                .map(|value| parse_indices(&value))
                .transpose()?,
            entry_point: non_empty("ENTRY_POINT")
                .unwrap_or_else(|| "single".to_string())
                .parse::<EntryPoint>()?,
            fetch_config: FetchConfig {
                max_retries: non_empty("MAX_RETRIES")
                    .unwrap_or_else(|| "3".to_string())
                    .parse::<u32>()
                    .context("MAX_RETRIES")?,
                retry_delay_ms: non_empty("RETRY_DELAY_MS")
                    .unwrap_or_else(|| "500".to_string())
                    .parse::<u64>()
                    .context("RETRY_DELAY_MS")?,
                request_timeout_secs: non_empty("REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|| "10".to_string())
                    .parse::<u64>()
                    .context("REQUEST_TIMEOUT_SECS")?,
            },
            report_path: non_empty("REPORT_PATH").map(PathBuf::from),
        })
    }
}

/// Parse a comma-separated list of feed ids
pub fn parse_feed_ids(value: &str) -> anyhow::Result<Vec<FeedId>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| id.parse::<FeedId>().with_context(|| format!("Invalid feed id: {}", id)))
        .collect()
}

/// Parse a comma-separated list of record indices
pub fn parse_indices(value: &str) -> anyhow::Result<Vec<usize>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|index| !index.is_empty())
        .map(|index| index.parse::<usize>().with_context(|| format!("Invalid index: {}", index)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const BTC: &str = "0xe62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43";
    const ETH: &str = "ff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace";

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let feeds = format!("{}, {}", BTC, ETH);
        let config = load(&[("FEED_IDS", feeds.as_str())]).unwrap();

        assert_eq!(config.hermes_url, DEFAULT_HERMES_URL);
        assert_eq!(config.hermes_fallback_url, None);
        assert_eq!(config.feed_ids.len(), 2);
        assert_eq!(config.feed_ids[0].to_hex(), BTC);
        assert_eq!(config.selected_indices, None);
        assert_eq!(config.entry_point, EntryPoint::SingleBytes);
        assert_eq!(config.fetch_config.max_retries, 3);
        assert_eq!(config.fetch_config.retry_delay_ms, 500);
        assert_eq!(config.fetch_config.request_timeout_secs, 10);
        assert!(config.report_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("FEED_IDS", BTC),
            ("HERMES_URL", "http://localhost:4000"),
            ("HERMES_FALLBACK_URL", "http://backup:4000"),
            ("SELECTED_INDICES", "2, 0"),
            ("ENTRY_POINT", "array"),
            ("MAX_RETRIES", "0"),
            ("REPORT_PATH", "out/report.json"),
        ])
        .unwrap();

        assert_eq!(config.hermes_url, "http://localhost:4000");
        assert_eq!(config.hermes_fallback_url.as_deref(), Some("http://backup:4000"));
        assert_eq!(config.selected_indices, Some(vec![2, 0]));
        assert_eq!(config.entry_point, EntryPoint::AccumulatorArray);
        assert_eq!(config.fetch_config.max_retries, 0);
        assert_eq!(config.report_path, Some(PathBuf::from("out/report.json")));
    }

    #[test]
    fn test_invalid_values() {
        assert!(load(&[]).is_err());
        assert!(load(&[("FEED_IDS", "0x1234")]).is_err());
        assert!(load(&[("FEED_IDS", BTC), ("SELECTED_INDICES", "1,x")]).is_err());
        assert!(load(&[("FEED_IDS", BTC), ("ENTRY_POINT", "multicall")]).is_err());
        assert!(load(&[("FEED_IDS", BTC), ("MAX_RETRIES", "-1")]).is_err());
    }
}
