//! Alpha Vantage market data provider implementation.
//!
//! Uses the `GLOBAL_QUOTE` function for the latest equity quote. Slower and
//! far more rate-limited than Finnhub, but dependable, so it sits in the
//! reliable tier of the chain.
//!
//! API documentation: https://www.alphavantage.co/documentation/

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::Quote;
use crate::provider::{MarketDataProvider, ProviderCapabilities, ProviderTier, RateLimit};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_ID: &str = "ALPHA_VANTAGE";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Alpha Vantage market data provider.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
}

/// Top-level `GLOBAL_QUOTE` response.
///
/// On errors or throttling the API still answers 200 and fills one of the
/// message fields instead of the quote.
#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "02. open")]
    open: Option<String>,
    #[serde(rename = "03. high")]
    high: Option<String>,
    #[serde(rename = "04. low")]
    low: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
    #[serde(rename = "08. previous close")]
    previous_close: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

impl AlphaVantageProvider {
    /// Create a new Alpha Vantage provider.
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, api_key }
    }

    /// Make a request to the Alpha Vantage API.
    async fn fetch(&self, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        let mut all_params: Vec<(&str, &str)> = params.to_vec();
        all_params.push(("apikey", self.api_key.as_str()));

        let url = reqwest::Url::parse_with_params(BASE_URL, &all_params).map_err(|e| {
            MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to build URL: {}", e),
            }
        })?;

        debug!(
            "Alpha Vantage request: {}",
            url.as_str().replace(&self.api_key, "***")
        );

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                MarketDataError::ProviderError {
                    provider: PROVIDER_ID.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::UpstreamRateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if !status.is_success() {
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        response
            .text()
            .await
            .map_err(|e| MarketDataError::bad_response(PROVIDER_ID, e.to_string()))
    }

    /// Check for API-level errors in a 200 response.
    fn check_api_error(
        error_message: &Option<String>,
        note: &Option<String>,
        information: &Option<String>,
    ) -> Result<(), MarketDataError> {
        if let Some(ref msg) = error_message {
            if msg.contains("Invalid API call") || msg.contains("not found") {
                return Err(MarketDataError::SymbolNotFound(msg.clone()));
            }
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: msg.clone(),
            });
        }

        for msg in [note, information].into_iter().flatten() {
            if msg.contains("API call frequency") || msg.contains("rate limit") {
                return Err(MarketDataError::UpstreamRateLimited {
                    provider: PROVIDER_ID.to_string(),
                });
            }
            warn!("Alpha Vantage message: {}", msg);
        }

        Ok(())
    }

    fn parse_decimal(s: &Option<String>) -> Option<Decimal> {
        s.as_deref().and_then(|v| Decimal::from_str(v.trim()).ok())
    }

    /// "1.2345%" -> 1.2345
    fn parse_percent(s: &Option<String>) -> Option<Decimal> {
        s.as_deref()
            .and_then(|v| Decimal::from_str(v.trim().trim_end_matches('%')).ok())
    }

    /// Trading day "YYYY-MM-DD" as midnight UTC.
    fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .and_then(|dt| Utc.from_local_datetime(&dt).single())
    }

    /// Normalize a `GLOBAL_QUOTE` body into a [`Quote`].
    fn parse_global_quote(
        symbol: &str,
        body: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<Quote, MarketDataError> {
        let response: GlobalQuoteResponse = serde_json::from_str(body).map_err(|e| {
            MarketDataError::bad_response(PROVIDER_ID, format!("Failed to parse response: {}", e))
        })?;

        Self::check_api_error(&response.error_message, &response.note, &response.information)?;

        let gq = response
            .global_quote
            .ok_or_else(|| MarketDataError::bad_response(PROVIDER_ID, "missing 'Global Quote'"))?;

        // Unknown symbols come back as an empty object
        if gq.symbol.is_none() && gq.price.is_none() {
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }

        let price = Self::parse_decimal(&gq.price)
            .ok_or_else(|| MarketDataError::bad_response(PROVIDER_ID, "missing or invalid price"))?;

        if price <= Decimal::ZERO {
            return Err(MarketDataError::ValidationFailed {
                message: format!("Non-positive price {} for {}", price, symbol),
            });
        }

        // The latest trading day only carries a date; keep fetch time unless
        // it's an older session.
        let timestamp = gq
            .latest_trading_day
            .as_deref()
            .and_then(Self::parse_date)
            .filter(|day| day.date_naive() < fetched_at.date_naive())
            .unwrap_or(fetched_at);

        let mut quote = Quote::new(symbol, price, PROVIDER_ID, timestamp);
        quote.open = Self::parse_decimal(&gq.open);
        quote.high = Self::parse_decimal(&gq.high);
        quote.low = Self::parse_decimal(&gq.low);
        quote.volume = Self::parse_decimal(&gq.volume);
        quote.previous_close = Self::parse_decimal(&gq.previous_close);
        quote.change = Self::parse_decimal(&gq.change);
        quote.change_percent = Self::parse_percent(&gq.change_percent);

        Ok(quote.with_derived_change())
    }
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            tier: ProviderTier::Reliable,
            requires_api_key: true,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        // Free tier is very limited
        RateLimit::per_minute(5)
    }

    async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let body = self
            .fetch(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])
            .await?;
        Self::parse_global_quote(symbol, &body, Utc::now())
    }
}
