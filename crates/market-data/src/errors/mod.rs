//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all provider operations
//! - [`RetryClass`]: Classification for determining failover behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur while fetching quotes from providers.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method, which determines how the provider registry should handle the error.
/// None of these escape the quote cache service as hard failures; they end up
/// as an `unavailable` result once the chain is exhausted.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The symbol argument itself is malformed.
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// The provider does not know the symbol (or returned an empty quote for it).
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider answered but the payload was malformed or incomplete.
    #[error("Bad response from {provider}: {message}")]
    BadResponse {
        /// The provider that returned the payload
        provider: String,
        /// What was wrong with it
        message: String,
    },

    /// The local call budget for the provider is exhausted.
    /// Raised before any network call is made.
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider whose budget is exhausted
        provider: String,
    },

    /// The provider itself rejected the request with HTTP 429 or a quota message.
    #[error("Upstream rate limit: {provider}")]
    UpstreamRateLimited {
        /// The provider that throttled us
        provider: String,
    },

    /// A provider-specific failure (non-2xx status, auth problem, ...).
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The circuit breaker is open for this provider.
    #[error("Circuit open: {provider}")]
    CircuitOpen {
        /// The provider with an open circuit
        provider: String,
    },

    /// The quote failed validation (non-positive price, broken OHLC, ...).
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Description of the validation failure
        message: String,
    },

    /// No provider is configured at all.
    #[error("No provider configured")]
    NoProviderConfigured,

    /// Every provider in the chain was tried or skipped and none succeeded.
    #[error("All providers failed: {summary}")]
    AllProvidersFailed {
        /// Per-provider outcome summary
        summary: String,
    },

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use quotecache_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::Timeout { provider: "FINNHUB".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::FailoverWithPenalty);
    ///
    /// let error = MarketDataError::SymbolNotFound("ZZZZ".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::NextProvider);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            // Misuse or chain-level outcomes
            Self::InvalidSymbol(_) | Self::NoProviderConfigured | Self::AllProvidersFailed { .. } => {
                RetryClass::Never
            }

            // Upstream health problems
            Self::Timeout { .. }
            | Self::UpstreamRateLimited { .. }
            | Self::ProviderError { .. }
            | Self::Network(_) => RetryClass::FailoverWithPenalty,

            // Provider is fine, it just can't serve this request
            Self::SymbolNotFound(_)
            | Self::BadResponse { .. }
            | Self::RateLimited { .. }
            | Self::ValidationFailed { .. } => RetryClass::NextProvider,

            Self::CircuitOpen { .. } => RetryClass::CircuitOpen,
        }
    }

    /// Build a `BadResponse` for `provider`.
    pub fn bad_response(provider: &str, message: impl Into<String>) -> Self {
        Self::BadResponse {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_symbol_never_retries() {
        let error = MarketDataError::InvalidSymbol("".to_string());
        assert_eq!(error.retry_class(), RetryClass::Never);
    }

    #[test]
    fn test_timeout_fails_over_with_penalty() {
        let error = MarketDataError::Timeout {
            provider: "FINNHUB".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::FailoverWithPenalty);
    }

    #[test]
    fn test_upstream_rate_limit_fails_over_with_penalty() {
        let error = MarketDataError::UpstreamRateLimited {
            provider: "ALPHA_VANTAGE".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::FailoverWithPenalty);
    }

    #[test]
    fn test_local_rate_limit_is_not_penalized() {
        let error = MarketDataError::RateLimited {
            provider: "FINNHUB".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::NextProvider);
    }

    #[test]
    fn test_bad_response_tries_next_provider() {
        let error = MarketDataError::bad_response("YAHOO", "missing price");
        assert_eq!(error.retry_class(), RetryClass::NextProvider);
    }

    #[test]
    fn test_symbol_not_found_tries_next_provider() {
        let error = MarketDataError::SymbolNotFound("ZZZZ".to_string());
        assert_eq!(error.retry_class(), RetryClass::NextProvider);
    }

    #[test]
    fn test_circuit_open_returns_circuit_open() {
        let error = MarketDataError::CircuitOpen {
            provider: "YAHOO".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::CircuitOpen);
    }

    #[test]
    fn test_chain_level_errors_never_retry() {
        assert_eq!(
            MarketDataError::NoProviderConfigured.retry_class(),
            RetryClass::Never
        );
        let error = MarketDataError::AllProvidersFailed {
            summary: "FINNHUB: ERROR (Timeout)".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Never);
    }

    #[test]
    fn test_error_display() {
        let error = MarketDataError::SymbolNotFound("ZZZZ".to_string());
        assert_eq!(format!("{}", error), "Symbol not found: ZZZZ");

        let error = MarketDataError::RateLimited {
            provider: "FINNHUB".to_string(),
        };
        assert_eq!(format!("{}", error), "Rate limited: FINNHUB");

        let error = MarketDataError::ProviderError {
            provider: "ALPHA_VANTAGE".to_string(),
            message: "HTTP 503".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "Provider error: ALPHA_VANTAGE - HTTP 503"
        );
    }
}
