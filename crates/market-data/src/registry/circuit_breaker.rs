//! Per-provider circuit breaker.
//!
//! A provider that keeps failing is taken out of the chain for a recovery
//! period so its remaining call budget isn't spent on requests that will
//! fail anyway. States:
//!
//! - **Closed**: calls flow normally.
//! - **Open**: calls are skipped until `recovery_timeout` has elapsed since
//!   the last failure.
//! - **HalfOpen**: probe calls are allowed; enough successes close the
//!   circuit, any failure reopens it.
//!
//! State lives in memory only and starts closed on restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::clock::{system_clock, SharedClock};
use crate::models::ProviderId;

const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);
const HALF_OPEN_SUCCESS_THRESHOLD: u32 = 2;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    last_failure: Option<DateTime<Utc>>,
}

impl Circuit {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            half_open_successes: 0,
            last_failure: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Time after the last failure before a probe is allowed.
    pub recovery_timeout: Duration,
    /// Probe successes needed to close from HalfOpen.
    pub half_open_success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            half_open_success_threshold: HALF_OPEN_SUCCESS_THRESHOLD,
        }
    }
}

/// Thread-safe circuit breaker keyed by provider id.
pub struct CircuitBreaker {
    circuits: Mutex<HashMap<String, Circuit>>,
    config: CircuitBreakerConfig,
    clock: SharedClock,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default(), system_clock())
    }

    pub fn with_config(config: CircuitBreakerConfig, clock: SharedClock) -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
            config,
            clock,
        }
    }

    /// Lock the circuits mutex, recovering from poison if necessary.
    ///
    /// The worst case after a poisoned lock is a slightly wrong circuit
    /// state, which is better than panicking in the fetch path.
    fn lock_circuits(&self) -> MutexGuard<'_, HashMap<String, Circuit>> {
        self.circuits.lock().unwrap_or_else(|poisoned| {
            warn!("Circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn recovery_elapsed(&self, last_failure: Option<DateTime<Utc>>) -> bool {
        let Some(last_failure) = last_failure else {
            return true;
        };
        let recovery = chrono::Duration::from_std(self.config.recovery_timeout)
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.clock.now() - last_failure >= recovery
    }

    /// Whether a call to `provider` may go out now.
    ///
    /// Moves an Open circuit to HalfOpen once the recovery timeout has
    /// elapsed.
    pub fn is_allowed(&self, provider: &ProviderId) -> bool {
        let mut circuits = self.lock_circuits();
        let Some(circuit) = circuits.get_mut(provider.as_ref()) else {
            return true;
        };

        match circuit.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                if self.recovery_elapsed(circuit.last_failure) {
                    info!("Circuit breaker: '{}' Open -> HalfOpen", provider);
                    circuit.state = CircuitState::HalfOpen;
                    circuit.half_open_successes = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self, provider: &ProviderId) {
        let mut circuits = self.lock_circuits();
        let circuit = circuits
            .entry(provider.to_string())
            .or_insert_with(Circuit::closed);

        match circuit.state {
            CircuitState::Closed => {
                circuit.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                circuit.half_open_successes += 1;
                debug!(
                    "Circuit breaker: probe success for '{}' ({}/{})",
                    provider, circuit.half_open_successes, self.config.half_open_success_threshold
                );
                if circuit.half_open_successes >= self.config.half_open_success_threshold {
                    info!("Circuit breaker: '{}' HalfOpen -> Closed", provider);
                    *circuit = Circuit::closed();
                }
            }
            CircuitState::Open => {
                // A call that was dispatched before the circuit opened
                debug!("Circuit breaker: late success for '{}' while open", provider);
            }
        }
    }

    pub fn record_failure(&self, provider: &ProviderId) {
        let now = self.clock.now();
        let mut circuits = self.lock_circuits();
        let circuit = circuits
            .entry(provider.to_string())
            .or_insert_with(Circuit::closed);

        circuit.consecutive_failures += 1;
        circuit.last_failure = Some(now);

        match circuit.state {
            CircuitState::Closed => {
                if circuit.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        "Circuit breaker: opening '{}' after {} consecutive failures",
                        provider, circuit.consecutive_failures
                    );
                    circuit.state = CircuitState::Open;
                } else {
                    debug!(
                        "Circuit breaker: failure for '{}' ({}/{})",
                        provider, circuit.consecutive_failures, self.config.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                warn!("Circuit breaker: probe failed for '{}', reopening", provider);
                circuit.state = CircuitState::Open;
                circuit.half_open_successes = 0;
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self, provider: &ProviderId) -> CircuitState {
        self.lock_circuits()
            .get(provider.as_ref())
            .map(|c| c.state)
            .unwrap_or(CircuitState::Closed)
    }

    pub fn failure_count(&self, provider: &ProviderId) -> u32 {
        self.lock_circuits()
            .get(provider.as_ref())
            .map(|c| c.consecutive_failures)
            .unwrap_or(0)
    }

    pub fn reset(&self, provider: &ProviderId) {
        if self.lock_circuits().remove(provider.as_ref()).is_some() {
            info!("Circuit breaker: reset '{}'", provider);
        }
    }

    /// Snapshot of every tracked circuit, sorted by provider id.
    pub fn snapshot(&self) -> Vec<CircuitStatus> {
        let circuits = self.lock_circuits();
        let mut statuses: Vec<CircuitStatus> = circuits
            .iter()
            .map(|(provider, circuit)| CircuitStatus {
                provider: provider.clone(),
                state: circuit.state,
                consecutive_failures: circuit.consecutive_failures,
                last_failure: circuit.last_failure,
            })
            .collect();
        statuses.sort_by(|a, b| a.provider.cmp(&b.provider));
        statuses
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitStatus {
    pub provider: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use std::borrow::Cow;
    use std::sync::Arc;

    const P: ProviderId = Cow::Borrowed("FINNHUB");

    fn breaker(threshold: u32, recovery_secs: u64) -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap(),
        ));
        let cb = CircuitBreaker::with_config(
            CircuitBreakerConfig {
                failure_threshold: threshold,
                recovery_timeout: Duration::from_secs(recovery_secs),
                half_open_success_threshold: 2,
            },
            clock.clone(),
        );
        (cb, clock)
    }

    #[test]
    fn test_starts_closed() {
        let (cb, _) = breaker(5, 60);
        assert!(cb.is_allowed(&P));
        assert_eq!(cb.state(&P), CircuitState::Closed);
    }

    #[test]
    fn test_opens_after_threshold() {
        let (cb, _) = breaker(3, 60);
        cb.record_failure(&P);
        cb.record_failure(&P);
        assert!(cb.is_allowed(&P));

        cb.record_failure(&P);
        assert_eq!(cb.state(&P), CircuitState::Open);
        assert!(!cb.is_allowed(&P));
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let (cb, _) = breaker(3, 60);
        cb.record_failure(&P);
        cb.record_failure(&P);
        cb.record_success(&P);
        assert_eq!(cb.failure_count(&P), 0);

        cb.record_failure(&P);
        assert_eq!(cb.state(&P), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_after_recovery_timeout() {
        let (cb, clock) = breaker(1, 60);
        cb.record_failure(&P);

        clock.advance_secs(59);
        assert!(!cb.is_allowed(&P));

        clock.advance_secs(1);
        assert!(cb.is_allowed(&P));
        assert_eq!(cb.state(&P), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_closes_after_probe_successes() {
        let (cb, clock) = breaker(1, 60);
        cb.record_failure(&P);
        clock.advance_secs(60);
        assert!(cb.is_allowed(&P));

        cb.record_success(&P);
        assert_eq!(cb.state(&P), CircuitState::HalfOpen);
        cb.record_success(&P);
        assert_eq!(cb.state(&P), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let (cb, clock) = breaker(1, 60);
        cb.record_failure(&P);
        clock.advance_secs(60);
        cb.is_allowed(&P);

        cb.record_failure(&P);
        assert_eq!(cb.state(&P), CircuitState::Open);
        // Recovery restarts from the new failure
        clock.advance_secs(30);
        assert!(!cb.is_allowed(&P));
    }

    #[test]
    fn test_provider_isolation_and_reset() {
        let (cb, _) = breaker(1, 60);
        let other: ProviderId = Cow::Borrowed("YAHOO");

        cb.record_failure(&P);
        assert!(!cb.is_allowed(&P));
        assert!(cb.is_allowed(&other));

        cb.reset(&P);
        assert!(cb.is_allowed(&P));
        assert_eq!(cb.failure_count(&P), 0);
    }

    #[test]
    fn test_snapshot_sorted() {
        let (cb, _) = breaker(5, 60);
        cb.record_failure(&Cow::Borrowed("YAHOO"));
        cb.record_failure(&P);
        cb.record_failure(&P);

        let snapshot = cb.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].provider, "FINNHUB");
        assert_eq!(snapshot[0].consecutive_failures, 2);
        assert_eq!(snapshot[1].state, CircuitState::Closed);
    }
}
