//! Quotecache Market Data Crate
//!
//! Provider-agnostic access to real-time equity quotes with bounded
//! upstream load.
//!
//! # Overview
//!
//! - Multiple providers behind one trait: Finnhub, Alpha Vantage, Yahoo Finance
//! - Priority tiers with automatic fallback
//! - Sliding-window call budgets, circuit breaking and a short-lived
//!   response cache per provider
//! - Market session detection driving cache TTLs
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! | ProviderRegistry |  (fallback chain)
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |  ResponseCache   | --> |  CircuitBreaker  |
//! +------------------+     +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |   RateLimiter    |
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |    Provider      |  (Finnhub, Alpha Vantage, Yahoo)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |     Quote        |  (validated)
//!                          +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Quote`] - Normalized quote payload
//! - [`ProviderRegistry`] - Ordered provider chain with its guards
//! - [`MarketSessionClock`] - Exchange session and TTL policy
//! - [`Clock`] - Injectable time source

pub mod clock;
pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;
pub mod session;

pub use clock::{system_clock, Clock, ManualClock, SharedClock, SystemClock};
pub use errors::{MarketDataError, RetryClass};
pub use models::{ProviderId, Quote};
pub use session::{MarketSession, MarketSessionClock, SessionTtls};

// Re-export provider types
pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::finnhub::FinnhubProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::{MarketDataProvider, ProviderCapabilities, ProviderTier, RateLimit};

// Re-export registry types
pub use registry::{
    AcquirePolicy, CacheCategory, CircuitBreaker, CircuitBreakerConfig, CircuitState,
    FetchDiagnostics, ProviderRegistry, ProviderStatus, QuoteValidator, RateLimitConfig,
    RateLimiter, ResponseCache, SkipReason,
};
