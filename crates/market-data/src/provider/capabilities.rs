//! Provider capabilities and rate limiting configuration.
//!
//! This module defines structures for describing what a market data provider
//! is, where it sits in the fallback chain, and how it should be rate-limited.

use std::time::Duration;

/// Position of a provider in the fallback chain.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum ProviderTier {
    /// Low-latency primary source.
    Fast,
    /// Slower but dependable secondary source.
    Reliable,
    /// Last resort, tried only when the others fail.
    Fallback,
}

impl ProviderTier {
    /// Default chain priority (lower = tried earlier).
    pub fn default_priority(self) -> u8 {
        match self {
            Self::Fast => 1,
            Self::Reliable => 2,
            Self::Fallback => 3,
        }
    }
}

/// Describes a market data provider.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Where the provider sits in the chain.
    pub tier: ProviderTier,

    /// Whether the provider needs an API key to be constructed.
    pub requires_api_key: bool,
}

/// Call budget for a provider: at most `max_calls` within any trailing `window`.
///
/// Controls how aggressively we can call a provider to avoid
/// hitting their rate limits and getting blocked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum calls allowed in the window.
    pub max_calls: u32,

    /// Length of the trailing window.
    pub window: Duration,
}

impl RateLimit {
    pub fn per_minute(max_calls: u32) -> Self {
        Self {
            max_calls,
            window: Duration::from_secs(60),
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::per_minute(60)
    }
}
