//! Short-lived cache of decoded provider responses.
//!
//! Absorbs duplicate upstream calls for the same (endpoint, params) within a
//! few seconds, independently of the per-symbol snapshot TTL. Entries expire
//! strictly at `expires_at`; expired entries are treated as misses and
//! evicted lazily on write or by [`ResponseCache::cleanup_expired`].

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::debug;

use crate::clock::{system_clock, SharedClock};

/// Data categories with their default cache TTLs.
///
/// TTLs follow how fast each kind of data actually changes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CacheCategory {
    Quote,
    Profile,
    Financials,
    News,
    Recommendations,
    PriceTarget,
    MarketStatus,
}

impl CacheCategory {
    pub fn default_ttl(self) -> Duration {
        let secs = match self {
            Self::Quote => 10,
            Self::Profile | Self::Financials => 3600,
            Self::News => 300,
            Self::Recommendations | Self::PriceTarget => 1800,
            Self::MarketStatus => 60,
        };
        Duration::from_secs(secs)
    }
}

/// Stable cache key for an endpoint and its parameters.
///
/// Parameters are sorted by key first so equivalent maps in any order hash
/// to the same value.
pub fn cache_key<'a, I>(endpoint: &str, params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let sorted: BTreeMap<&str, &str> = params.into_iter().collect();
    let mut canonical = String::from(endpoint);
    for (k, v) in sorted {
        canonical.push('|');
        canonical.push_str(k);
        canonical.push('=');
        canonical.push_str(v);
    }
    format!("{:x}", md5::compute(canonical.as_bytes()))
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    stored_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Thread-safe TTL cache keyed by (endpoint, params).
pub struct ResponseCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    clock: SharedClock,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Cached value for the request, if present and not expired.
    pub fn get<'a, I>(&self, endpoint: &str, params: I) -> Option<V>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.get_entry(endpoint, params).map(|(value, _)| value)
    }

    /// Like [`get`](Self::get), also returning when the value was stored.
    pub fn get_entry<'a, I>(&self, endpoint: &str, params: I) -> Option<(V, DateTime<Utc>)>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let key = cache_key(endpoint, params);
        let now = self.clock.now();

        let entry = self.entries.get(&key)?;
        if now < entry.expires_at {
            debug!("Response cache hit: {}", endpoint);
            Some((entry.value.clone(), entry.stored_at))
        } else {
            None
        }
    }

    /// Store a value for `ttl`. Expired entries are evicted on the way.
    pub fn set<'a, I>(&self, endpoint: &str, params: I, value: V, ttl: Duration)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let key = cache_key(endpoint, params);
        let now = self.clock.now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());

        self.entries.retain(|_, e| now < e.expires_at);
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
                expires_at: now + ttl,
            },
        );
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Evict expired entries, returning how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.entries.retain(|_, e| {
            let keep = now < e.expires_at;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
