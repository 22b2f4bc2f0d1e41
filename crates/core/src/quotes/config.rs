//! Quote cache configuration.

use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use quotecache_market_data::registry::DEFAULT_PROVIDER_TIMEOUT;
use quotecache_market_data::session::DEFAULT_EXCHANGE_TZ;
use quotecache_market_data::{AcquirePolicy, SessionTtls};

/// Largest batch a single `get_quotes` call accepts.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;

/// Symbols fetched concurrently within one batch.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 8;

/// What to return when every provider fails and an expired snapshot exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StalePolicy {
    /// Report the symbol as unavailable.
    #[default]
    Unavailable,
    /// Return the expired snapshot tagged `stale`.
    ServeStale,
}

#[derive(Debug, Clone)]
pub struct QuoteCacheConfig {
    pub exchange_tz: Tz,
    pub session_ttls: SessionTtls,
    pub stale_policy: StalePolicy,
    pub max_batch_size: usize,
    pub batch_concurrency: usize,
    pub provider_timeout: Duration,
}

impl Default for QuoteCacheConfig {
    fn default() -> Self {
        Self {
            exchange_tz: DEFAULT_EXCHANGE_TZ,
            session_ttls: SessionTtls::default(),
            stale_policy: StalePolicy::default(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

/// Per-request options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteOptions {
    /// Skip the snapshot and go to the providers.
    #[serde(default)]
    pub force_refresh: bool,
    /// Overrides the configured [`StalePolicy`] for this request.
    #[serde(default)]
    pub allow_stale: Option<bool>,
    /// Overrides the default call discipline (blocking for single lookups,
    /// skip for batches).
    #[serde(skip)]
    pub acquire_policy: Option<AcquirePolicy>,
}

impl QuoteOptions {
    pub fn force_refresh() -> Self {
        Self {
            force_refresh: true,
            ..Self::default()
        }
    }

    pub fn with_allow_stale(mut self, allow: bool) -> Self {
        self.allow_stale = Some(allow);
        self
    }

    pub fn with_acquire_policy(mut self, policy: AcquirePolicy) -> Self {
        self.acquire_policy = Some(policy);
        self
    }

    pub(crate) fn serve_stale(&self, default: StalePolicy) -> bool {
        self.allow_stale
            .unwrap_or(default == StalePolicy::ServeStale)
    }
}
