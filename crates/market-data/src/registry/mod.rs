//! Provider orchestration.
//!
//! - Provider registration and priority ordering
//! - Sliding-window call budgets per provider
//! - Short-lived response cache
//! - Circuit breaking for fault tolerance
//! - Quote data validation

mod circuit_breaker;
mod rate_limiter;
mod registry;
mod response_cache;
mod skip_reason;
mod validator;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState, CircuitStatus};
pub use rate_limiter::{AcquirePolicy, RateLimitConfig, RateLimiter};
pub use registry::{ProviderRegistry, ProviderStatus, DEFAULT_PROVIDER_TIMEOUT};
pub use response_cache::{cache_key, CacheCategory, ResponseCache};
pub use skip_reason::{AttemptOutcome, FetchDiagnostics, ProviderAttempt, SkipReason};
pub use validator::{QuoteValidator, ValidationIssue, ValidationSeverity, ValidatorConfig};
