//! Yahoo Finance market data provider.
//!
//! Keyless last-resort source. Uses the chart API through `yahoo_finance_api`
//! and derives the previous close from the prior daily bar.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};
use yahoo_finance_api as yahoo;

use crate::errors::MarketDataError;
use crate::models::Quote;
use crate::provider::{MarketDataProvider, ProviderCapabilities, ProviderTier, RateLimit};

const PROVIDER_ID: &str = "YAHOO";

/// One daily bar, decoupled from the connector's types.
#[derive(Clone, Debug)]
struct Bar {
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

impl From<&yahoo::Quote> for Bar {
    fn from(q: &yahoo::Quote) -> Self {
        Self {
            timestamp: q.timestamp as i64,
            open: q.open,
            high: q.high,
            low: q.low,
            close: q.close,
            volume: q.volume,
        }
    }
}

/// Build a quote from daily bars ordered oldest to newest.
fn bars_to_quote(
    symbol: &str,
    bars: &[Bar],
    fetched_at: DateTime<Utc>,
) -> Result<Quote, MarketDataError> {
    let last = bars
        .last()
        .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

    if !last.close.is_finite() || last.close <= 0.0 {
        return Err(MarketDataError::ValidationFailed {
            message: format!("Non-positive close {} for {}", last.close, symbol),
        });
    }

    let price = Decimal::from_f64_retain(last.close)
        .map(|d| d.round_dp(4))
        .ok_or_else(|| {
            MarketDataError::bad_response(
                PROVIDER_ID,
                format!("Failed to convert close price {} to Decimal", last.close),
            )
        })?;

    let timestamp = Utc
        .timestamp_opt(last.timestamp, 0)
        .single()
        .unwrap_or(fetched_at);

    let positive = |v: f64| {
        if v.is_finite() && v > 0.0 {
            Decimal::from_f64_retain(v).map(|d| d.round_dp(4))
        } else {
            None
        }
    };

    let mut quote = Quote::new(symbol, price, PROVIDER_ID, timestamp);
    quote.open = positive(last.open);
    quote.high = positive(last.high);
    quote.low = positive(last.low);
    quote.volume = Decimal::from_u64(last.volume);
    quote.previous_close = bars
        .len()
        .checked_sub(2)
        .and_then(|i| bars.get(i))
        .and_then(|prev| positive(prev.close));

    Ok(quote.with_derived_change())
}

/// Yahoo Finance market data provider.
pub struct YahooProvider {
    connector: yahoo::YahooConnector,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider.
    pub fn new() -> Result<Self, MarketDataError> {
        let connector =
            yahoo::YahooConnector::new().map_err(|e| MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to initialize Yahoo connector: {}", e),
            })?;
        Ok(Self { connector })
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            tier: ProviderTier::Fallback,
            requires_api_key: false,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        // Unofficial API; stay well below the point where it starts blocking
        RateLimit::per_minute(120)
    }

    async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        debug!("Fetching latest quote for {} from Yahoo", symbol);

        let response = self
            .connector
            .get_latest_quotes(symbol, "1d")
            .await
            .map_err(|e| {
                if matches!(e, yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult) {
                    MarketDataError::SymbolNotFound(symbol.to_string())
                } else {
                    MarketDataError::ProviderError {
                        provider: PROVIDER_ID.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        let quotes = response.quotes().map_err(|e| {
            warn!("No quotes returned for {}: {}", symbol, e);
            MarketDataError::SymbolNotFound(symbol.to_string())
        })?;

        let bars: Vec<Bar> = quotes.iter().map(Bar::from).collect();
        bars_to_quote(symbol, &bars, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(timestamp: i64, close: f64) -> Bar {
        Bar {
            timestamp,
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1_000,
        }
    }

    #[test]
    fn test_bars_to_quote_uses_prior_close() {
        let bars = vec![bar(1709251200, 100.0), bar(1709510400, 110.0)];
        let quote = bars_to_quote("AAPL", &bars, Utc::now()).unwrap();

        assert_eq!(quote.price, dec!(110));
        assert_eq!(quote.previous_close, Some(dec!(100)));
        assert_eq!(quote.change, Some(dec!(10)));
        assert_eq!(quote.change_percent, Some(dec!(10)));
        assert_eq!(quote.volume, Some(dec!(1000)));
        assert_eq!(quote.data_source, "YAHOO");
        assert_eq!(quote.timestamp.timestamp(), 1709510400);
    }

    #[test]
    fn test_bars_to_quote_single_bar() {
        let quote = bars_to_quote("AAPL", &[bar(1709510400, 50.5)], Utc::now()).unwrap();
        assert_eq!(quote.price, dec!(50.5));
        assert!(quote.previous_close.is_none());
        assert!(quote.change.is_none());
    }

    #[test]
    fn test_bars_to_quote_empty() {
        let err = bars_to_quote("ZZZZ", &[], Utc::now()).unwrap_err();
        assert!(matches!(err, MarketDataError::SymbolNotFound(_)));
    }

    #[test]
    fn test_bars_to_quote_zero_close() {
        let err = bars_to_quote("ZZZZ", &[bar(1709510400, 0.0)], Utc::now()).unwrap_err();
        assert!(matches!(err, MarketDataError::ValidationFailed { .. }));
    }

    #[test]
    fn test_capabilities() {
        let provider = YahooProvider::new().unwrap();
        let caps = provider.capabilities();
        assert_eq!(caps.tier, ProviderTier::Fallback);
        assert!(!caps.requires_api_key);
        assert_eq!(provider.priority(), 3);
    }
}
