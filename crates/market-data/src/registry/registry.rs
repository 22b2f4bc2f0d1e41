//! Provider registry: the fallback chain.
//!
//! The registry owns the providers and everything that guards them:
//! - ordering by priority (tier default, overridable per provider)
//! - the short-lived response cache
//! - circuit breaking
//! - per-provider call budgets
//! - a per-call timeout
//! - quote validation
//!
//! A fetch walks the chain in order and stops at the first provider that
//! returns a valid quote. Nothing here ever invents a price: when the chain
//! is exhausted the caller gets `AllProvidersFailed` with a per-provider
//! summary.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;

use super::circuit_breaker::{CircuitBreakerConfig, CircuitState, CircuitStatus};
use super::rate_limiter::{AcquirePolicy, RateLimitConfig};
use super::response_cache::CacheCategory;
use super::skip_reason::{FetchDiagnostics, SkipReason};
use super::{CircuitBreaker, QuoteValidator, RateLimiter, ResponseCache};
use crate::clock::{system_clock, SharedClock};
use crate::errors::{MarketDataError, RetryClass};
use crate::models::{ProviderId, Quote};
use crate::provider::MarketDataProvider;

/// Default upper bound on a single provider call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Endpoint name used for response cache keys.
const QUOTE_ENDPOINT: &str = "quote";

struct RegisteredProvider {
    provider: Arc<dyn MarketDataProvider>,
    priority: u8,
}

/// Point-in-time view of one provider in the chain.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub id: String,
    pub priority: u8,
    pub remaining_calls: u32,
    pub circuit_state: CircuitState,
}

/// Provider registry for orchestrating quote fetching.
pub struct ProviderRegistry {
    providers: Vec<RegisteredProvider>,
    rate_limiter: RateLimiter,
    response_cache: ResponseCache<Quote>,
    circuit_breaker: CircuitBreaker,
    validator: QuoteValidator,
    provider_timeout: Duration,
    response_ttl: Duration,
    clock: SharedClock,
}

impl ProviderRegistry {
    /// Registry on the system clock with default guards.
    pub fn new(providers: Vec<Arc<dyn MarketDataProvider>>) -> Self {
        Self::with_clock(providers, system_clock())
    }

    /// Registry whose limiter, cache and breaker all read `clock`.
    ///
    /// Each provider's call budget starts from its own [`rate_limit`] and
    /// can be overridden with [`with_rate_limit`](Self::with_rate_limit).
    ///
    /// [`rate_limit`]: MarketDataProvider::rate_limit
    pub fn with_clock(providers: Vec<Arc<dyn MarketDataProvider>>, clock: SharedClock) -> Self {
        let rate_limiter = RateLimiter::with_clock(clock.clone());

        let mut registered: Vec<RegisteredProvider> = providers
            .into_iter()
            .map(|provider| {
                let id: ProviderId = Cow::Borrowed(provider.id());
                rate_limiter.configure(&id, RateLimitConfig::from(provider.rate_limit()));
                RegisteredProvider {
                    priority: provider.priority(),
                    provider,
                }
            })
            .collect();
        // Stable sort keeps registration order among equal priorities
        registered.sort_by_key(|p| p.priority);

        Self {
            providers: registered,
            rate_limiter,
            response_cache: ResponseCache::with_clock(clock.clone()),
            circuit_breaker: CircuitBreaker::with_config(CircuitBreakerConfig::default(), clock.clone()),
            validator: QuoteValidator::new(),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            response_ttl: CacheCategory::Quote.default_ttl(),
            clock,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Override the call budget of a registered provider.
    pub fn with_rate_limit(self, provider_id: &str, config: RateLimitConfig) -> Self {
        if let Some(p) = self.find(provider_id) {
            let id: ProviderId = Cow::Borrowed(p.provider.id());
            self.rate_limiter.configure(&id, config);
        } else {
            warn!("Rate limit override for unknown provider '{}'", provider_id);
        }
        self
    }

    /// Override the chain position of a registered provider.
    pub fn with_priority(mut self, provider_id: &str, priority: u8) -> Self {
        match self
            .providers
            .iter_mut()
            .find(|p| p.provider.id() == provider_id)
        {
            Some(p) => p.priority = priority,
            None => warn!("Priority override for unknown provider '{}'", provider_id),
        }
        self.providers.sort_by_key(|p| p.priority);
        self
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig, clock: SharedClock) -> Self {
        self.circuit_breaker = CircuitBreaker::with_config(config, clock);
        self
    }

    pub fn with_validator(mut self, validator: QuoteValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_response_ttl(mut self, ttl: Duration) -> Self {
        self.response_ttl = ttl;
        self
    }

    fn find(&self, provider_id: &str) -> Option<&RegisteredProvider> {
        self.providers
            .iter()
            .find(|p| p.provider.id() == provider_id)
    }

    /// Fetch the latest quote for a normalized symbol.
    pub async fn fetch_latest_quote(
        &self,
        symbol: &str,
        policy: AcquirePolicy,
    ) -> Result<Quote, MarketDataError> {
        self.fetch_latest_quote_with_diagnostics(symbol, policy)
            .await
            .0
    }

    /// Like [`fetch_latest_quote`](Self::fetch_latest_quote), also returning
    /// what each provider in the chain did.
    ///
    /// Order of checks per provider: response cache, circuit breaker, call
    /// budget, then the upstream call under the provider timeout. A quote
    /// that fails validation moves the chain on like any other failure.
    pub async fn fetch_latest_quote_with_diagnostics(
        &self,
        symbol: &str,
        policy: AcquirePolicy,
    ) -> (Result<Quote, MarketDataError>, FetchDiagnostics) {
        let mut diagnostics = FetchDiagnostics::new();

        if self.providers.is_empty() {
            warn!("No quote providers configured");
            return (Err(MarketDataError::NoProviderConfigured), diagnostics);
        }

        for registered in &self.providers {
            let provider = &registered.provider;
            let provider_id: ProviderId = Cow::Borrowed(provider.id());
            let params = [("provider", provider.id()), ("symbol", symbol)];

            if let Some((quote, stored_at)) =
                self.response_cache.get_entry(QUOTE_ENDPOINT, params)
            {
                debug!("Serving {} from '{}' response cache", symbol, provider_id);
                diagnostics.record_cached(provider_id, stored_at);
                return (Ok(quote), diagnostics);
            }

            if !self.circuit_breaker.is_allowed(&provider_id) {
                debug!("Circuit open for '{}', skipping {}", provider_id, symbol);
                diagnostics.record_skip(provider_id, SkipReason::CircuitBreakerOpen);
                continue;
            }

            if let Err(e) = self.rate_limiter.acquire(&provider_id, policy).await {
                debug!("'{}' skipped for {}: {}", provider_id, symbol, e);
                diagnostics.record_skip(provider_id, SkipReason::RateLimited);
                continue;
            }

            debug!("Fetching {} from '{}'", symbol, provider_id);

            let outcome = match tokio::time::timeout(
                self.provider_timeout,
                provider.get_latest_quote(symbol),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(MarketDataError::Timeout {
                    provider: provider_id.to_string(),
                }),
            };

            let error = match outcome.and_then(|quote| {
                self.validator.validate(&quote)?;
                Ok(quote)
            }) {
                Ok(quote) => {
                    self.circuit_breaker.record_success(&provider_id);
                    self.response_cache.set(
                        QUOTE_ENDPOINT,
                        params,
                        quote.clone(),
                        self.response_ttl,
                    );
                    info!("Fetched {} from '{}' at {}", symbol, provider_id, quote.price);
                    diagnostics.record_success(provider_id, self.clock.now());
                    return (Ok(quote), diagnostics);
                }
                Err(e) => e,
            };

            match error.retry_class() {
                RetryClass::Never => {
                    info!("Terminal error from '{}' for {}: {}", provider_id, symbol, error);
                    diagnostics.record_error(provider_id, error.to_string());
                    return (Err(error), diagnostics);
                }
                RetryClass::FailoverWithPenalty => {
                    self.circuit_breaker.record_failure(&provider_id);
                    warn!("Provider '{}' failed for {}: {}", provider_id, symbol, error);
                }
                RetryClass::NextProvider | RetryClass::CircuitOpen => {
                    debug!("Provider '{}' can't serve {}: {}", provider_id, symbol, error);
                }
            }
            diagnostics.record_error(provider_id, error.to_string());
        }

        let summary = diagnostics.summary();
        warn!("All providers failed for {}: {}", symbol, summary);
        (Err(MarketDataError::AllProvidersFailed { summary }), diagnostics)
    }

    /// Provider ids in chain order.
    pub fn provider_ids(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.provider.id()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Chain order, remaining budget and circuit state of every provider.
    pub fn status(&self) -> Vec<ProviderStatus> {
        let circuits: HashMap<String, CircuitStatus> = self
            .circuit_breaker
            .snapshot()
            .into_iter()
            .map(|c| (c.provider.clone(), c))
            .collect();

        self.providers
            .iter()
            .map(|p| {
                let id: ProviderId = Cow::Borrowed(p.provider.id());
                ProviderStatus {
                    id: id.to_string(),
                    priority: p.priority,
                    remaining_calls: self.rate_limiter.remaining_calls(&id),
                    circuit_state: circuits
                        .get(id.as_ref())
                        .map(|c| c.state)
                        .unwrap_or(CircuitState::Closed),
                }
            })
            .collect()
    }

    /// Drop every cached provider response.
    pub fn clear_response_cache(&self) {
        self.response_cache.clear();
    }

    /// Evict expired provider responses.
    pub fn cleanup_response_cache(&self) -> usize {
        self.response_cache.cleanup_expired()
    }
}
