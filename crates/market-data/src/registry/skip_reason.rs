//! Per-fetch record of what each provider in the chain did.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::ProviderId;

/// Why a provider was passed over without being called.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    CircuitBreakerOpen,
    /// Local call budget was exhausted under the skip policy.
    RateLimited,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircuitBreakerOpen => write!(f, "circuit open"),
            Self::RateLimited => write!(f, "rate limited"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptOutcome {
    Success,
    /// Served from the short-lived response cache, no upstream call.
    Cached,
    Skipped { reason: SkipReason },
    Failed { error: String },
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAttempt {
    pub provider_id: ProviderId,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Ordered attempts made while fetching one symbol.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FetchDiagnostics {
    pub attempts: Vec<ProviderAttempt>,
    /// When the served quote left the upstream provider. Earlier than the
    /// fetch itself for response cache hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, provider_id: ProviderId, outcome: AttemptOutcome) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            outcome,
        });
    }

    pub fn record_skip(&mut self, provider_id: ProviderId, reason: SkipReason) {
        self.push(provider_id, AttemptOutcome::Skipped { reason });
    }

    pub fn record_error(&mut self, provider_id: ProviderId, error: impl Into<String>) {
        self.push(
            provider_id,
            AttemptOutcome::Failed {
                error: error.into(),
            },
        );
    }

    pub fn record_success(&mut self, provider_id: ProviderId, received_at: DateTime<Utc>) {
        self.received_at = Some(received_at);
        self.push(provider_id, AttemptOutcome::Success);
    }

    pub fn record_cached(&mut self, provider_id: ProviderId, stored_at: DateTime<Utc>) {
        self.received_at = Some(stored_at);
        self.push(provider_id, AttemptOutcome::Cached);
    }

    /// One line per fetch: `FINNHUB: failed (timeout) -> YAHOO: success`.
    pub fn summary(&self) -> String {
        if self.attempts.is_empty() {
            return "no providers attempted".to_string();
        }
        self.attempts
            .iter()
            .map(|a| match &a.outcome {
                AttemptOutcome::Success => format!("{}: success", a.provider_id),
                AttemptOutcome::Cached => format!("{}: cached", a.provider_id),
                AttemptOutcome::Skipped { reason } => {
                    format!("{}: skipped ({})", a.provider_id, reason)
                }
                AttemptOutcome::Failed { error } => format!("{}: failed ({})", a.provider_id, error),
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn has_success(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| matches!(a.outcome, AttemptOutcome::Success | AttemptOutcome::Cached))
    }

    /// True when every provider was skipped and none was actually called.
    pub fn all_skipped(&self) -> bool {
        !self.attempts.is_empty()
            && self
                .attempts
                .iter()
                .all(|a| matches!(a.outcome, AttemptOutcome::Skipped { .. }))
    }

    pub fn skip_reasons(&self) -> Vec<(&ProviderId, &SkipReason)> {
        self.attempts
            .iter()
            .filter_map(|a| match &a.outcome {
                AttemptOutcome::Skipped { reason } => Some((&a.provider_id, reason)),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<(&ProviderId, &str)> {
        self.attempts
            .iter()
            .filter_map(|a| match &a.outcome {
                AttemptOutcome::Failed { error } => Some((&a.provider_id, error.as_str())),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap()
    }

    #[test]
    fn test_summary_lists_attempts_in_order() {
        let mut diag = FetchDiagnostics::new();
        diag.record_skip(Cow::Borrowed("FINNHUB"), SkipReason::CircuitBreakerOpen);
        diag.record_error(Cow::Borrowed("ALPHA_VANTAGE"), "timeout");
        diag.record_success(Cow::Borrowed("YAHOO"), at());

        assert_eq!(
            diag.summary(),
            "FINNHUB: skipped (circuit open) -> ALPHA_VANTAGE: failed (timeout) -> YAHOO: success"
        );
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(FetchDiagnostics::new().summary(), "no providers attempted");
    }

    #[test]
    fn test_success_and_skip_queries() {
        let mut diag = FetchDiagnostics::new();
        diag.record_skip(Cow::Borrowed("FINNHUB"), SkipReason::RateLimited);
        assert!(!diag.has_success());
        assert!(diag.all_skipped());

        assert!(diag.received_at.is_none());

        diag.record_cached(Cow::Borrowed("YAHOO"), at());
        assert!(diag.has_success());
        assert_eq!(diag.received_at, Some(at()));
        assert!(!diag.all_skipped());
        assert_eq!(diag.skip_reasons().len(), 1);
        assert!(diag.errors().is_empty());
    }
}
