//! Provider identifiers and configuration keys.

/// Data source identifiers
pub const DATA_SOURCE_FINNHUB: &str = "FINNHUB";
pub const DATA_SOURCE_ALPHA_VANTAGE: &str = "ALPHA_VANTAGE";
pub const DATA_SOURCE_YAHOO: &str = "YAHOO";

/// Providers in default chain order.
pub const DEFAULT_PROVIDER_ORDER: [&str; 3] = [
    DATA_SOURCE_FINNHUB,
    DATA_SOURCE_ALPHA_VANTAGE,
    DATA_SOURCE_YAHOO,
];
