//! Per-provider call budget.
//!
//! Each provider gets a sliding window of dispatch instants bounded by
//! `max_calls` over a trailing `window`. Windows live in memory and reset on
//! restart.
//!
//! The check-and-record step in [`RateLimiter::acquire`] happens under one
//! lock, so concurrent callers can never push a provider past its budget.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::clock::{system_clock, SharedClock};
use crate::errors::MarketDataError;
use crate::models::ProviderId;
use crate::provider::RateLimit;

/// Default budget: 60 calls per 60 seconds.
const DEFAULT_MAX_CALLS: u32 = 60;
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// What to do when a provider's budget is exhausted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AcquirePolicy {
    /// Sleep until the window frees a slot, then proceed.
    /// For interactive single-symbol lookups.
    Blocking,
    /// Give up immediately with [`MarketDataError::RateLimited`].
    /// For batch and background work where staleness beats latency.
    SkipIfExhausted,
}

/// Rate limiter configuration for a provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum calls within the window.
    pub max_calls: u32,
    /// Length of the trailing window.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: DEFAULT_MAX_CALLS,
            window: DEFAULT_WINDOW,
        }
    }
}

impl From<RateLimit> for RateLimitConfig {
    fn from(limit: RateLimit) -> Self {
        Self {
            max_calls: limit.max_calls,
            window: limit.window,
        }
    }
}

/// Outcome of one check-and-record attempt.
enum Reservation {
    Taken,
    Wait(Duration),
    /// The budget is zero; no amount of waiting frees a slot.
    Never,
}

/// Sliding window of call instants for a single provider.
#[derive(Debug)]
struct CallWindow {
    calls: VecDeque<DateTime<Utc>>,
    max_calls: u32,
    window: chrono::Duration,
}

impl CallWindow {
    fn new(config: &RateLimitConfig) -> Self {
        Self {
            calls: VecDeque::new(),
            max_calls: config.max_calls,
            window: chrono::Duration::from_std(config.window)
                .unwrap_or_else(|_| chrono::Duration::seconds(60)),
        }
    }

    /// Drop instants that have left the trailing window.
    fn prune(&mut self, now: DateTime<Utc>) {
        while let Some(oldest) = self.calls.front() {
            if now - *oldest >= self.window {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }

    fn has_capacity(&mut self, now: DateTime<Utc>) -> bool {
        self.prune(now);
        (self.calls.len() as u64) < u64::from(self.max_calls)
    }

    fn record(&mut self, now: DateTime<Utc>) {
        self.calls.push_back(now);
    }

    fn remaining(&mut self, now: DateTime<Utc>) -> u32 {
        self.prune(now);
        self.max_calls.saturating_sub(self.calls.len() as u32)
    }

    /// Time until the oldest call leaves the window.
    fn wait_time(&mut self, now: DateTime<Utc>) -> Duration {
        if self.has_capacity(now) {
            return Duration::ZERO;
        }
        if self.max_calls == 0 {
            // A zero budget never frees up; report a full window.
            return self.window.to_std().unwrap_or(DEFAULT_WINDOW);
        }

        // Only the calls beyond capacity need to expire.
        let excess = self.calls.len() - self.max_calls as usize;
        self.calls
            .get(excess)
            .map(|oldest| (*oldest + self.window - now).to_std().unwrap_or(Duration::ZERO))
            .unwrap_or(Duration::ZERO)
    }
}

/// Sliding-window rate limiter for multiple providers.
///
/// Thread-safe; windows are created on first use from the provider's
/// configured budget (or the default).
pub struct RateLimiter {
    /// Per-provider call windows.
    windows: Mutex<HashMap<String, CallWindow>>,
    /// Per-provider configuration overrides.
    configs: Mutex<HashMap<String, RateLimitConfig>>,
    clock: SharedClock,
}

impl RateLimiter {
    /// Create a new rate limiter on the system clock.
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            configs: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Lock the windows mutex, recovering from poison if necessary.
    ///
    /// Recovering is safe here: the worst case is a slightly wrong count.
    fn lock_windows(&self) -> MutexGuard<'_, HashMap<String, CallWindow>> {
        self.windows.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter windows mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Lock the configs mutex, recovering from poison if necessary.
    fn lock_configs(&self) -> MutexGuard<'_, HashMap<String, RateLimitConfig>> {
        self.configs.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter configs mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Configure the budget for a specific provider.
    pub fn configure(&self, provider: &ProviderId, config: RateLimitConfig) {
        let mut configs = self.lock_configs();
        configs.insert(provider.to_string(), config);
        drop(configs); // Release configs lock before acquiring windows lock

        // Reset the window if it already exists
        let mut windows = self.lock_windows();
        windows.remove(provider.as_ref());
    }

    /// Run `f` against the provider's window, creating it if needed.
    fn with_window<T>(
        &self,
        provider: &ProviderId,
        f: impl FnOnce(&mut CallWindow, DateTime<Utc>) -> T,
    ) -> T {
        let now = self.clock.now();
        let mut windows = self.lock_windows();
        let window = windows
            .entry(provider.to_string())
            .or_insert_with(|| self.create_window(provider));
        f(window, now)
    }

    /// Whether a call could be dispatched right now. Does not record it.
    pub fn try_acquire(&self, provider: &ProviderId) -> bool {
        self.with_window(provider, |w, now| w.has_capacity(now))
    }

    /// Record a dispatched call.
    pub fn record_call(&self, provider: &ProviderId) {
        self.with_window(provider, |w, now| w.record(now));
    }

    /// Calls left in the current window.
    pub fn remaining_calls(&self, provider: &ProviderId) -> u32 {
        self.with_window(provider, |w, now| w.remaining(now))
    }

    /// How long until the next call may be dispatched.
    pub fn wait_time(&self, provider: &ProviderId) -> Duration {
        self.with_window(provider, |w, now| w.wait_time(now))
    }

    /// Check capacity and record the call in one step.
    fn try_reserve(&self, provider: &ProviderId) -> Reservation {
        self.with_window(provider, |w, now| {
            if w.max_calls == 0 {
                Reservation::Never
            } else if w.has_capacity(now) {
                w.record(now);
                Reservation::Taken
            } else {
                Reservation::Wait(w.wait_time(now))
            }
        })
    }

    /// Take a slot for the provider according to `policy`.
    ///
    /// On success the call is already recorded; the caller must dispatch it.
    /// A provider with a zero budget is refused under either policy.
    pub async fn acquire(
        &self,
        provider: &ProviderId,
        policy: AcquirePolicy,
    ) -> Result<(), MarketDataError> {
        loop {
            let wait = match self.try_reserve(provider) {
                Reservation::Taken => {
                    debug!("Rate limiter: acquired slot for '{}'", provider);
                    return Ok(());
                }
                Reservation::Never => {
                    debug!("Rate limiter: '{}' has no call budget", provider);
                    return Err(MarketDataError::RateLimited {
                        provider: provider.to_string(),
                    });
                }
                Reservation::Wait(wait) => wait,
            };

            match policy {
                AcquirePolicy::SkipIfExhausted => {
                    debug!(
                        "Rate limiter: '{}' exhausted, skipping (next slot in {:?})",
                        provider, wait
                    );
                    return Err(MarketDataError::RateLimited {
                        provider: provider.to_string(),
                    });
                }
                AcquirePolicy::Blocking => {
                    debug!("Rate limiter: waiting {:?} for provider '{}'", wait, provider);
                    // Never spin on a zero wait if another caller raced us.
                    tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
                }
            }
        }
    }

    /// Reset the window for a provider.
    pub fn reset(&self, provider: &ProviderId) {
        let mut windows = self.lock_windows();
        windows.remove(provider.as_ref());
    }

    /// Create a window for a provider, using custom config if available.
    fn create_window(&self, provider: &ProviderId) -> CallWindow {
        let configs = self.lock_configs();
        let config = configs.get(provider.as_ref()).cloned().unwrap_or_default();
        CallWindow::new(&config)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use std::borrow::Cow;
    use std::sync::Arc;

    fn manual_limiter(max_calls: u32, window_secs: u64) -> (RateLimiter, Arc<ManualClock>, ProviderId) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap(),
        ));
        let limiter = RateLimiter::with_clock(clock.clone());
        let provider: ProviderId = Cow::Borrowed("TEST_PROVIDER");
        limiter.configure(
            &provider,
            RateLimitConfig {
                max_calls,
                window: Duration::from_secs(window_secs),
            },
        );
        (limiter, clock, provider)
    }

    #[test]
    fn test_exhaustion_reports_wait_time() {
        let (limiter, _clock, provider) = manual_limiter(2, 60);

        assert!(limiter.try_acquire(&provider));
        limiter.record_call(&provider);
        assert!(limiter.try_acquire(&provider));
        limiter.record_call(&provider);

        assert!(!limiter.try_acquire(&provider));
        assert!(limiter.wait_time(&provider) > Duration::ZERO);
        assert_eq!(limiter.remaining_calls(&provider), 0);
    }

    #[test]
    fn test_try_acquire_does_not_consume() {
        let (limiter, _clock, provider) = manual_limiter(1, 60);
        assert!(limiter.try_acquire(&provider));
        assert!(limiter.try_acquire(&provider));
        assert_eq!(limiter.remaining_calls(&provider), 1);
    }

    #[test]
    fn test_window_slides() {
        let (limiter, clock, provider) = manual_limiter(2, 60);

        limiter.record_call(&provider);
        clock.advance_secs(30);
        limiter.record_call(&provider);
        assert!(!limiter.try_acquire(&provider));

        // First call leaves the window at exactly t0+60
        assert_eq!(limiter.wait_time(&provider), Duration::from_secs(30));
        clock.advance_secs(30);
        assert!(limiter.try_acquire(&provider));
        assert_eq!(limiter.remaining_calls(&provider), 1);
    }

    #[test]
    fn test_default_config() {
        let limiter = RateLimiter::new();
        let provider: ProviderId = Cow::Borrowed("UNCONFIGURED");
        assert_eq!(limiter.remaining_calls(&provider), DEFAULT_MAX_CALLS);
    }

    #[test]
    fn test_per_provider_isolation() {
        let (limiter, _clock, provider_a) = manual_limiter(1, 60);
        let provider_b: ProviderId = Cow::Borrowed("PROVIDER_B");

        limiter.record_call(&provider_a);
        assert!(!limiter.try_acquire(&provider_a));
        assert!(limiter.try_acquire(&provider_b));
    }

    #[test]
    fn test_reset() {
        let (limiter, _clock, provider) = manual_limiter(1, 60);
        limiter.record_call(&provider);
        assert!(!limiter.try_acquire(&provider));

        limiter.reset(&provider);
        assert!(limiter.try_acquire(&provider));
    }

    #[tokio::test]
    async fn test_skip_policy_returns_rate_limited() {
        let (limiter, _clock, provider) = manual_limiter(1, 60);

        limiter
            .acquire(&provider, AcquirePolicy::SkipIfExhausted)
            .await
            .unwrap();
        let err = limiter
            .acquire(&provider, AcquirePolicy::SkipIfExhausted)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketDataError::RateLimited { .. }));
        // The skipped call was not recorded
        assert_eq!(limiter.remaining_calls(&provider), 0);
        limiter.reset(&provider);
        assert_eq!(limiter.remaining_calls(&provider), 1);
    }

    #[tokio::test]
    async fn test_blocking_policy_waits_for_slot() {
        let limiter = RateLimiter::new();
        let provider: ProviderId = Cow::Borrowed("BLOCKING_PROVIDER");
        limiter.configure(
            &provider,
            RateLimitConfig {
                max_calls: 1,
                window: Duration::from_millis(50),
            },
        );

        limiter.acquire(&provider, AcquirePolicy::Blocking).await.unwrap();

        let start = std::time::Instant::now();
        limiter.acquire(&provider, AcquirePolicy::Blocking).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_zero_budget_is_refused_without_waiting() {
        let limiter = RateLimiter::new();
        let provider: ProviderId = Cow::Borrowed("NO_BUDGET");
        limiter.configure(
            &provider,
            RateLimitConfig {
                max_calls: 0,
                window: Duration::from_millis(20),
            },
        );

        for policy in [AcquirePolicy::Blocking, AcquirePolicy::SkipIfExhausted] {
            let outcome =
                tokio::time::timeout(Duration::from_secs(2), limiter.acquire(&provider, policy))
                    .await
                    .expect("acquire should return without waiting");
            assert!(matches!(outcome, Err(MarketDataError::RateLimited { .. })));
        }
        assert_eq!(limiter.remaining_calls(&provider), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_never_exceeds_budget() {
        let (limiter, _clock, provider) = manual_limiter(10, 60);
        let limiter = Arc::new(limiter);

        let mut handles = Vec::new();
        for _ in 0..50 {
            let limiter = limiter.clone();
            let provider = provider.clone();
            handles.push(tokio::spawn(async move {
                limiter
                    .acquire(&provider, AcquirePolicy::SkipIfExhausted)
                    .await
                    .is_ok()
            }));
        }

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }

        assert_eq!(granted, 10);
    }
}
