//! Market data provider trait definitions.
//!
//! This module defines the core `MarketDataProvider` trait that all
//! market data providers must implement.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::Quote;

use super::capabilities::{ProviderCapabilities, RateLimit};

/// Trait for market data providers.
///
/// Implement this trait to add support for a new quote source.
/// The registry uses the provider's capabilities and priority to decide
/// where it sits in the fallback chain, and wraps every call with the
/// provider's rate limiter, response cache and circuit breaker.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use quotecache_market_data::provider::{
///     MarketDataProvider, ProviderCapabilities, ProviderTier, RateLimit,
/// };
///
/// struct MyProvider {
///     api_key: String,
/// }
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities {
///             tier: ProviderTier::Reliable,
///             requires_api_key: true,
///         }
///     }
///
///     fn rate_limit(&self) -> RateLimit {
///         RateLimit::per_minute(30)
///     }
///
///     // ... implement get_latest_quote
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "FINNHUB", "YAHOO", etc.
    /// Used for logging, rate limit and circuit breaker tracking, and as
    /// the `dataSource` of the quotes it produces.
    fn id(&self) -> &'static str;

    /// Provider priority for ordering.
    ///
    /// Lower values = higher priority. Defaults to the tier's priority.
    fn priority(&self) -> u8 {
        self.capabilities().tier.default_priority()
    }

    /// Describes the provider's tier and requirements.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Default call budget for this provider.
    ///
    /// May be overridden per provider through configuration.
    fn rate_limit(&self) -> RateLimit;

    /// Fetch the latest quote for a normalized symbol.
    ///
    /// Implementations must return a typed error (never panic) on timeouts,
    /// non-2xx responses, missing fields or a non-positive price.
    async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError>;
}
