use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Normalized real-time quote.
///
/// Every provider maps its own field names into this shape, so callers and
/// the snapshot store never see provider-specific payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Uppercase ticker
    pub symbol: String,

    /// Last traded price (required, positive)
    pub price: Decimal,

    /// Absolute change vs. previous close
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<Decimal>,

    /// Percent change vs. previous close (1.5 means +1.5%)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<Decimal>,

    /// Provider that produced the quote (FINNHUB, ALPHA_VANTAGE, YAHOO)
    pub data_source: String,

    /// Provider-reported quote time, or fetch time when the provider has none
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Create a quote with only the required fields.
    pub fn new(
        symbol: impl Into<String>,
        price: Decimal,
        data_source: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            change: None,
            change_percent: None,
            volume: None,
            high: None,
            low: None,
            open: None,
            previous_close: None,
            market_cap: None,
            data_source: data_source.into(),
            timestamp,
        }
    }

    /// Fill in `change` and `change_percent` from `previous_close` when the
    /// provider did not report them.
    pub fn with_derived_change(mut self) -> Self {
        if let Some(prev) = self.previous_close.filter(|p| !p.is_zero()) {
            let change = self.change.unwrap_or(self.price - prev);
            self.change = Some(change);
            if self.change_percent.is_none() {
                self.change_percent = Some((change / prev * Decimal::ONE_HUNDRED).round_dp(4));
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_new() {
        let quote = Quote::new("AAPL", dec!(150.25), "FINNHUB", Utc::now());
        assert_eq!(quote.price, dec!(150.25));
        assert_eq!(quote.data_source, "FINNHUB");
        assert!(quote.open.is_none());
    }

    #[test]
    fn test_derived_change() {
        let mut quote = Quote::new("AAPL", dec!(110), "YAHOO", Utc::now());
        quote.previous_close = Some(dec!(100));
        let quote = quote.with_derived_change();
        assert_eq!(quote.change, Some(dec!(10)));
        assert_eq!(quote.change_percent, Some(dec!(10)));
    }

    #[test]
    fn test_derived_change_keeps_reported_values() {
        let mut quote = Quote::new("AAPL", dec!(110), "FINNHUB", Utc::now());
        quote.previous_close = Some(dec!(100));
        quote.change = Some(dec!(9.5));
        quote.change_percent = Some(dec!(9.5));
        let quote = quote.with_derived_change();
        assert_eq!(quote.change, Some(dec!(9.5)));
        assert_eq!(quote.change_percent, Some(dec!(9.5)));
    }

    #[test]
    fn test_serializes_camel_case() {
        let mut quote = Quote::new("MSFT", dec!(410.5), "ALPHA_VANTAGE", Utc::now());
        quote.previous_close = Some(dec!(400));
        let json = serde_json::to_value(&quote).unwrap();
        assert!(json.get("previousClose").is_some());
        assert!(json.get("dataSource").is_some());
        assert!(json.get("marketCap").is_none());
    }
}
