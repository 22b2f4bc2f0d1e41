//! Quote Cache Service.
//!
//! The public entry point for quotes:
//! - serve a fresh snapshot when one exists
//! - otherwise fetch through the provider chain and store the result with
//!   the TTL of the current market session
//! - report `unavailable` when the chain is exhausted, never a made-up price
//!
//! Concurrent requests for the same symbol share one upstream fetch.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::Serialize;

use quotecache_market_data::{
    AcquirePolicy, MarketDataError, MarketSession, MarketSessionClock, ProviderStatus,
    SharedClock,
};

use super::client::MarketDataClient;
use super::config::QuoteCacheConfig;
use super::config::QuoteOptions;
use super::model::{QuoteResult, QuoteSnapshot};
use super::store::QuoteSnapshotStore;
use super::types::Symbol;
use crate::errors::{Result, ValidationError};

/// Current session as seen by the cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketStatus {
    pub session: MarketSession,
    /// TTL a quote fetched right now would get.
    pub ttl_seconds: u32,
    pub exchange_timezone: String,
    pub as_of: DateTime<Utc>,
}

/// Quote cache operations.
#[async_trait]
pub trait QuoteCacheServiceTrait: Send + Sync {
    /// Quote for one symbol.
    ///
    /// Only caller misuse (empty or malformed symbol) is an error. Provider
    /// failures come back as an `unavailable` result.
    async fn get_quote(&self, symbol: &str, options: QuoteOptions) -> Result<QuoteResult>;

    /// Quotes for many symbols, keyed by normalized symbol.
    ///
    /// Symbols are independent: some may be unavailable while others are
    /// served. Duplicates collapse to one entry. More than the configured
    /// batch size is an error.
    async fn get_quotes(
        &self,
        symbols: &[String],
        options: QuoteOptions,
    ) -> Result<HashMap<String, QuoteResult>>;

    /// Remove one snapshot, or all of them. Idempotent.
    async fn clear_cache(&self, symbol: Option<&str>) -> Result<usize>;

    fn market_status(&self) -> MarketStatus;

    fn provider_status(&self) -> Vec<ProviderStatus>;

    /// Evict expired provider responses. Returns how many were dropped.
    fn sweep_expired_responses(&self) -> usize;
}

/// Per-symbol single-flight slot.
#[derive(Default)]
struct InFlight {
    lock: tokio::sync::Mutex<()>,
    /// Successful fetches completed while the slot was alive.
    completed: AtomicU64,
}

pub struct QuoteCacheService {
    store: Arc<dyn QuoteSnapshotStore>,
    client: Arc<MarketDataClient>,
    session_clock: MarketSessionClock,
    clock: SharedClock,
    config: QuoteCacheConfig,
    in_flight: DashMap<String, Arc<InFlight>>,
}

impl QuoteCacheService {
    pub fn new(
        store: Arc<dyn QuoteSnapshotStore>,
        client: Arc<MarketDataClient>,
        config: QuoteCacheConfig,
        clock: SharedClock,
    ) -> Self {
        let session_clock = MarketSessionClock::with_config(config.exchange_tz, config.session_ttls);
        Self {
            store,
            client,
            session_clock,
            clock,
            config,
            in_flight: DashMap::new(),
        }
    }

    pub fn config(&self) -> &QuoteCacheConfig {
        &self.config
    }

    /// Stored snapshot, treating a read failure as a miss.
    fn load(&self, symbol: &Symbol) -> Option<QuoteSnapshot> {
        match self.store.get(symbol.as_str()) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Failed to read snapshot for {}: {}", symbol, e);
                None
            }
        }
    }

    fn fresh_snapshot(&self, symbol: &Symbol) -> Option<QuoteResult> {
        let now = self.clock.now();
        self.load(symbol)
            .filter(|s| s.is_fresh(now))
            .map(|s| QuoteResult::cached(s, now))
    }

    fn flight(&self, symbol: &Symbol) -> Arc<InFlight> {
        self.in_flight
            .entry(symbol.to_string())
            .or_default()
            .clone()
    }

    /// Cache check, single-flight fetch and store for one normalized symbol.
    async fn resolve(&self, symbol: &Symbol, options: QuoteOptions, policy: AcquirePolicy) -> QuoteResult {
        if !options.force_refresh {
            if let Some(hit) = self.fresh_snapshot(symbol) {
                debug!("Serving {} from snapshot", symbol);
                return hit;
            }
        }

        let flight = self.flight(symbol);
        let seen = flight.completed.load(Ordering::Acquire);

        let result = {
            let _guard = flight.lock.lock().await;

            // A flight that finished while we waited stored a fresh snapshot,
            // which also satisfies a forced refresh
            let joined = if !options.force_refresh
                || flight.completed.load(Ordering::Acquire) != seen
            {
                self.fresh_snapshot(symbol)
            } else {
                None
            };

            match joined {
                Some(result) => result,
                None => {
                    let (result, stored) = self.fetch_and_store(symbol, options, policy).await;
                    if stored {
                        flight.completed.fetch_add(1, Ordering::AcqRel);
                    }
                    result
                }
            }
        };

        drop(flight);
        self.in_flight
            .remove_if(symbol.as_str(), |_, slot| Arc::strong_count(slot) == 1);

        result
    }

    /// Fetch through the provider chain and store the result.
    ///
    /// The flag is true only when a new snapshot reached the store.
    async fn fetch_and_store(
        &self,
        symbol: &Symbol,
        options: QuoteOptions,
        policy: AcquirePolicy,
    ) -> (QuoteResult, bool) {
        let (outcome, diagnostics) = self.client.fetch_latest_quote(symbol.as_str(), policy).await;
        let now = self.clock.now();

        match outcome {
            Ok(mut quote) => {
                quote.symbol = symbol.to_string();
                let session = self.session_clock.current_session(now);
                let ttl = self.session_clock.ttl_for_session(session);
                // Response cache hits carry the time the provider answered
                let fetched_at = diagnostics.received_at.unwrap_or(now).min(now);
                let snapshot = QuoteSnapshot::new(symbol, quote, fetched_at, ttl);

                debug!(
                    "Storing {} from {} with {}s TTL ({} session)",
                    symbol, snapshot.data_source, ttl, session
                );

                match self.store.upsert(snapshot.clone()).await {
                    Ok(saved) => (QuoteResult::fetched(saved), true),
                    Err(e) => {
                        warn!("Failed to store snapshot for {}: {}", symbol, e);
                        (QuoteResult::fetched(snapshot), false)
                    }
                }
            }
            Err(e) => {
                let message = unavailable_message(symbol, &e);
                debug!("Fetch diagnostics for {}: {}", symbol, diagnostics.summary());

                if options.serve_stale(self.config.stale_policy) {
                    if let Some(snapshot) = self.load(symbol) {
                        if snapshot.is_fresh(now) {
                            info!("Refresh failed for {}, snapshot still fresh: {}", symbol, message);
                            return (QuoteResult::cached(snapshot, now), false);
                        }
                        info!("Serving stale snapshot for {}: {}", symbol, message);
                        return (QuoteResult::stale(snapshot, now, message), false);
                    }
                }

                info!("{}", message);
                (QuoteResult::unavailable(symbol.as_str(), message), false)
            }
        }
    }
}

fn unavailable_message(symbol: &Symbol, error: &MarketDataError) -> String {
    match error {
        MarketDataError::AllProvidersFailed { summary } => {
            format!("Quote unavailable for {}: {}", symbol, summary)
        }
        MarketDataError::NoProviderConfigured => {
            format!("Quote unavailable for {}: no quote provider configured", symbol)
        }
        other => format!("Quote unavailable for {}: {}", symbol, other),
    }
}

#[async_trait]
impl QuoteCacheServiceTrait for QuoteCacheService {
    async fn get_quote(&self, symbol: &str, options: QuoteOptions) -> Result<QuoteResult> {
        let symbol = Symbol::parse(symbol)?;
        let policy = options.acquire_policy.unwrap_or(AcquirePolicy::Blocking);
        Ok(self.resolve(&symbol, options, policy).await)
    }

    async fn get_quotes(
        &self,
        symbols: &[String],
        options: QuoteOptions,
    ) -> Result<HashMap<String, QuoteResult>> {
        let max = self.config.max_batch_size;
        if symbols.len() > max {
            return Err(ValidationError::BatchTooLarge {
                count: symbols.len(),
                max,
            }
            .into());
        }

        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(symbols.len());
        for raw in symbols {
            let symbol = Symbol::parse(raw)?;
            if seen.insert(symbol.clone()) {
                unique.push(symbol);
            }
        }

        let policy = options
            .acquire_policy
            .unwrap_or(AcquirePolicy::SkipIfExhausted);
        let concurrency = self.config.batch_concurrency.max(1);

        debug!(
            "Fetching batch of {} symbols (concurrency {})",
            unique.len(),
            concurrency
        );

        let results: Vec<QuoteResult> = stream::iter(unique)
            .map(|symbol| async move { self.resolve(&symbol, options, policy).await })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        Ok(results
            .into_iter()
            .map(|r| (r.symbol.clone(), r))
            .collect())
    }

    async fn clear_cache(&self, symbol: Option<&str>) -> Result<usize> {
        let removed = match symbol {
            Some(raw) => {
                let symbol = Symbol::parse(raw)?;
                self.store.clear(symbol.as_str()).await?
            }
            None => self.store.clear_all().await?,
        };
        self.client.clear_response_cache();

        info!(
            "Cleared {} snapshot(s) for {}",
            removed,
            symbol.unwrap_or("all symbols")
        );
        Ok(removed)
    }

    fn market_status(&self) -> MarketStatus {
        let now = self.clock.now();
        let session = self.session_clock.current_session(now);
        MarketStatus {
            session,
            ttl_seconds: self.session_clock.ttl_for_session(session),
            exchange_timezone: self.session_clock.timezone().name().to_string(),
            as_of: now,
        }
    }

    fn provider_status(&self) -> Vec<ProviderStatus> {
        self.client.provider_status()
    }

    fn sweep_expired_responses(&self) -> usize {
        self.client.cleanup_response_cache()
    }
}
