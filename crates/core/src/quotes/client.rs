//! Market Data Client - Facade for the market-data crate.
//!
//! Builds the provider chain from configuration and hands the service a
//! single entry point for fetching a quote.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      QuoteCacheService                       │
//! │                              │                               │
//! │                              ▼                               │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                  MarketDataClient                      │  │
//! │  │                                                        │  │
//! │  │  ProviderConfig[] ─▶ providers ─▶ ProviderRegistry     │  │
//! │  │                                        │               │  │
//! │  │            Quote + FetchDiagnostics ◀──┘               │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::errors::{Error, Result};
use crate::quotes::constants::*;

use quotecache_market_data::{
    AcquirePolicy, AlphaVantageProvider, FetchDiagnostics, FinnhubProvider, MarketDataError,
    MarketDataProvider, ProviderRegistry, ProviderStatus, Quote, RateLimitConfig, SharedClock,
    YahooProvider,
};

/// Provider configuration for initialization.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// Provider ID (e.g., "FINNHUB", "YAHOO")
    pub id: String,
    pub enabled: bool,
    /// Required by keyed providers; an empty or missing key drops the
    /// provider from the chain.
    pub api_key: Option<String>,
    /// Chain position override (lower = tried first)
    pub priority: Option<u8>,
    /// Call budget override
    pub rate_limit: Option<RateLimitConfig>,
}

impl ProviderConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            api_key: None,
            priority: None,
            rate_limit: None,
        }
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Market data client - facade over the provider registry.
///
/// Handles:
/// - Provider initialization from API keys
/// - Priority and rate limit overrides
/// - Forwarding fetches to the registry
pub struct MarketDataClient {
    registry: ProviderRegistry,
}

impl MarketDataClient {
    /// Create a client with providers initialized from `configs`.
    ///
    /// Providers without a required key are skipped, as are providers that
    /// fail to initialize. An unknown provider id is a configuration error.
    /// A client with no providers is valid; every fetch then comes back
    /// `NoProviderConfigured`.
    pub fn new(configs: &[ProviderConfig], clock: SharedClock, timeout: Duration) -> Result<Self> {
        if let Some(unknown) = configs
            .iter()
            .find(|c| !DEFAULT_PROVIDER_ORDER.contains(&c.id.as_str()))
        {
            return Err(Error::InvalidConfigValue(format!(
                "Unknown market data provider '{}'",
                unknown.id
            )));
        }

        let mut providers: Vec<Arc<dyn MarketDataProvider>> = Vec::new();
        let mut init_errors: Vec<String> = Vec::new();

        for config in configs.iter().filter(|c| c.enabled) {
            match Self::create_provider(config) {
                Ok(Some(provider)) => {
                    info!("Initialized market data provider: {}", config.id);
                    providers.push(provider);
                }
                Ok(None) => {
                    debug!(
                        "Provider {} requires API key but none found, skipping",
                        config.id
                    );
                }
                Err(e) => {
                    let msg = format!("{}: {}", config.id, e);
                    warn!("Failed to initialize provider {}", msg);
                    init_errors.push(msg);
                }
            }
        }

        let mut registry = ProviderRegistry::with_clock(providers, clock).with_timeout(timeout);
        for config in configs.iter().filter(|c| c.enabled) {
            if let Some(priority) = config.priority {
                registry = registry.with_priority(&config.id, priority);
            }
            if let Some(limit) = &config.rate_limit {
                registry = registry.with_rate_limit(&config.id, limit.clone());
            }
        }

        if registry.is_empty() {
            warn!(
                "No market data providers initialized! Errors: {:?}",
                init_errors
            );
        } else {
            info!(
                "Market data client initialized with providers: {:?}",
                registry.provider_ids()
            );
        }

        Ok(Self { registry })
    }

    /// Wrap an already built registry.
    pub fn from_registry(registry: ProviderRegistry) -> Self {
        Self { registry }
    }

    /// Build one provider. `Ok(None)` when its required key is missing.
    fn create_provider(
        config: &ProviderConfig,
    ) -> std::result::Result<Option<Arc<dyn MarketDataProvider>>, MarketDataError> {
        let key = config.api_key.clone();
        let provider: Option<Arc<dyn MarketDataProvider>> = match config.id.as_str() {
            DATA_SOURCE_FINNHUB => {
                key.map(|k| Arc::new(FinnhubProvider::new(k)) as Arc<dyn MarketDataProvider>)
            }
            DATA_SOURCE_ALPHA_VANTAGE => {
                key.map(|k| Arc::new(AlphaVantageProvider::new(k)) as Arc<dyn MarketDataProvider>)
            }
            DATA_SOURCE_YAHOO => Some(Arc::new(YahooProvider::new()?)),
            _ => None,
        };
        Ok(provider)
    }

    /// Fetch the latest quote through the fallback chain.
    pub async fn fetch_latest_quote(
        &self,
        symbol: &str,
        policy: AcquirePolicy,
    ) -> (std::result::Result<Quote, MarketDataError>, FetchDiagnostics) {
        self.registry
            .fetch_latest_quote_with_diagnostics(symbol, policy)
            .await
    }

    pub fn provider_ids(&self) -> Vec<&'static str> {
        self.registry.provider_ids()
    }

    pub fn provider_status(&self) -> Vec<ProviderStatus> {
        self.registry.status()
    }

    /// Drop cached provider responses so the next fetch goes upstream.
    pub fn clear_response_cache(&self) {
        self.registry.clear_response_cache();
    }

    pub fn cleanup_response_cache(&self) -> usize {
        self.registry.cleanup_response_cache()
    }
}
