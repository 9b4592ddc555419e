use crate::types::FeedId;
use std::collections::HashMap;
use tracing::debug;

/// Well-known Pyth price feeds
const DEFAULT_FEEDS: &[(&str, &str)] = &[
    ("BTC/USD", "e62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43"),
    ("ETH/USD", "ff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace"),
    ("SOL/USD", "ef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d"),
    ("USDC/USD", "eaa020c61cc479712813461ce153894a96a6c00b21ed0cfc2798d1f9a9e9c94a"),
    ("USDT/USD", "2b89b9dc8fdf9f34709a5b106b472f0f39bb6ca9ce04b0fd7f2e971688e2e53b"),
];

/// Maps feed ids to human-readable symbols for reporting
pub trait SymbolResolver: Send + Sync {
    fn resolve(&self, feed_id: &FeedId) -> Option<String>;
}

/// In-memory symbol table
#[derive(Debug, Clone, Default)]
pub struct StaticSymbolResolver {
    symbols: HashMap<FeedId, String>,
}

impl StaticSymbolResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table pre-filled with the major USD pairs
    pub fn with_defaults() -> Self {
        let mut resolver = Self::new();
        for (symbol, feed) in DEFAULT_FEEDS {
            if let Ok(feed_id) = feed.parse() {
                resolver.register(feed_id, symbol);
            }
        }
        resolver
    }

    pub fn register(&mut self, feed_id: FeedId, symbol: &str) {
        debug!("Registered symbol {} for feed {}", symbol, feed_id);
        self.symbols.insert(feed_id, symbol.to_string());
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl SymbolResolver for StaticSymbolResolver {
    fn resolve(&self, feed_id: &FeedId) -> Option<String> {
        self.symbols.get(feed_id).cloned()
    }
}
