/// Classification for failover policy.
///
/// Used by the registry to decide what an error from one provider means for
/// the rest of the fallback chain.
///
/// | Class | Try Next Provider? | Record Circuit Breaker Failure? |
/// |-------|-------------------|--------------------------------|
/// | `Never` | No | No |
/// | `FailoverWithPenalty` | Yes | Yes |
/// | `NextProvider` | Yes | No |
/// | `CircuitOpen` | Yes (skip this one) | No (already recorded) |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Stop the chain. Only used for caller misuse; no provider can help.
    Never,

    /// Failover to the next provider and record a circuit breaker penalty.
    ///
    /// Used for upstream health problems (timeouts, 429s, 5xx). Enough of
    /// these opens the circuit and the provider drops out of the chain for
    /// a recovery period.
    FailoverWithPenalty,

    /// Try the next provider without recording a penalty.
    ///
    /// The provider is healthy but could not answer this request (unknown
    /// symbol, missing fields, self-imposed rate limit).
    NextProvider,

    /// Circuit breaker is open for this provider; skip it.
    CircuitOpen,
}
