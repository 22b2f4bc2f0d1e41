//! Quote cache domain models.
//!
//! - [`QuoteSnapshot`] is what the store keeps: one row per symbol.
//! - [`QuoteResult`] is what callers get back: a quote plus freshness
//!   metadata, or an explicit unavailable marker.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use quotecache_market_data::Quote;

use super::types::Symbol;

// =============================================================================
// QuoteSnapshot
// =============================================================================

/// Last successfully fetched quote for a symbol.
///
/// At most one snapshot exists per symbol. It is overwritten wholesale on
/// every successful fetch and only removed by an explicit clear. The TTL is
/// assigned at fetch time from the market session and never changes until
/// the next fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSnapshot {
    pub symbol: String,
    pub payload: Quote,
    pub fetched_at: DateTime<Utc>,
    pub ttl_seconds: u32,
    pub data_source: String,
}

impl QuoteSnapshot {
    pub fn new(symbol: &Symbol, payload: Quote, fetched_at: DateTime<Utc>, ttl_seconds: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            data_source: payload.data_source.clone(),
            payload,
            fetched_at,
            ttl_seconds,
        }
    }

    /// `now - fetched_at < ttl_seconds`, strictly.
    ///
    /// The single staleness check for the whole crate; don't inline it.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.fetched_at < Duration::seconds(i64::from(self.ttl_seconds))
    }

    /// Whole seconds since the fetch, never negative.
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.fetched_at).num_seconds().max(0)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.fetched_at + Duration::seconds(i64::from(self.ttl_seconds))
    }
}

// =============================================================================
// QuoteResult
// =============================================================================

/// Outcome of a quote request.
///
/// Exactly one of these holds:
/// - fresh from a provider: `quote` set, `cached == false`
/// - served from a fresh snapshot: `quote` set, `cached == true`
/// - stale fallback (opt-in): `quote` set, `cached == true`, `stale == true`
/// - nothing usable: `quote` unset, `unavailable == true`, `message` set
///
/// A price is never made up to fill the unavailable case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResult {
    pub symbol: String,
    pub cached: bool,
    pub stale: bool,
    pub unavailable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_age_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<Quote>,
}

impl QuoteResult {
    fn from_snapshot(snapshot: QuoteSnapshot) -> Self {
        Self {
            symbol: snapshot.symbol,
            cached: false,
            stale: false,
            unavailable: false,
            message: None,
            data_source: Some(snapshot.data_source),
            cache_age_seconds: None,
            fetched_at: Some(snapshot.fetched_at),
            ttl_seconds: Some(snapshot.ttl_seconds),
            quote: Some(snapshot.payload),
        }
    }

    /// Just fetched from a provider.
    pub fn fetched(snapshot: QuoteSnapshot) -> Self {
        Self::from_snapshot(snapshot)
    }

    /// Served from a fresh snapshot.
    pub fn cached(snapshot: QuoteSnapshot, now: DateTime<Utc>) -> Self {
        let age = snapshot.age_seconds(now);
        Self {
            cached: true,
            cache_age_seconds: Some(age),
            ..Self::from_snapshot(snapshot)
        }
    }

    /// Expired snapshot served because the caller opted in.
    pub fn stale(snapshot: QuoteSnapshot, now: DateTime<Utc>, message: impl Into<String>) -> Self {
        let age = snapshot.age_seconds(now);
        Self {
            cached: true,
            stale: true,
            message: Some(message.into()),
            cache_age_seconds: Some(age),
            ..Self::from_snapshot(snapshot)
        }
    }

    pub fn unavailable(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            cached: false,
            stale: false,
            unavailable: true,
            message: Some(message.into()),
            data_source: None,
            cache_age_seconds: None,
            fetched_at: None,
            ttl_seconds: None,
            quote: None,
        }
    }

    pub fn is_available(&self) -> bool {
        !self.unavailable
    }
}
