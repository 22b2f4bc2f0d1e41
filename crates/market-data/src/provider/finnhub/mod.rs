//! Finnhub market data provider implementation.
//!
//! Serves real-time equity quotes from the `/quote` endpoint. This is the
//! fast, primary tier of the fallback chain.
//!
//! Finnhub free tier is limited to 60 API calls per minute.
//! API documentation: https://finnhub.io/docs/api

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::errors::MarketDataError;
use crate::models::Quote;
use crate::provider::{MarketDataProvider, ProviderCapabilities, ProviderTier, RateLimit};

const BASE_URL: &str = "https://finnhub.io/api/v1";
const PROVIDER_ID: &str = "FINNHUB";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /quote endpoint
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price
    c: Option<f64>,
    /// Change
    d: Option<f64>,
    /// Percent change
    dp: Option<f64>,
    /// High price of the day
    h: Option<f64>,
    /// Low price of the day
    l: Option<f64>,
    /// Open price of the day
    o: Option<f64>,
    /// Previous close price
    pc: Option<f64>,
    /// Timestamp (Unix)
    t: Option<i64>,
}

/// Error response from Finnhub
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
}

fn to_decimal(value: Option<f64>) -> Option<Decimal> {
    value.and_then(|v| Decimal::try_from(v).ok())
}

/// Normalize a `/quote` body into a [`Quote`].
fn parse_quote(symbol: &str, body: &str, fetched_at: DateTime<Utc>) -> Result<Quote, MarketDataError> {
    let response: QuoteResponse = serde_json::from_str(body).map_err(|e| {
        MarketDataError::bad_response(PROVIDER_ID, format!("Failed to parse quote response: {}", e))
    })?;

    let price = response
        .c
        .ok_or_else(|| MarketDataError::bad_response(PROVIDER_ID, "missing current price"))?;

    // Finnhub returns zeros for unknown symbols instead of an error
    if price <= 0.0 {
        return Err(MarketDataError::SymbolNotFound(format!(
            "Symbol not found or no trading data: {}",
            symbol
        )));
    }

    let price = Decimal::try_from(price).map_err(|_| MarketDataError::ValidationFailed {
        message: format!("Invalid price: {}", price),
    })?;

    let timestamp = response
        .t
        .filter(|ts| *ts > 0)
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .unwrap_or(fetched_at);

    let mut quote = Quote::new(symbol, price, PROVIDER_ID, timestamp);
    quote.change = to_decimal(response.d);
    quote.change_percent = to_decimal(response.dp);
    quote.high = to_decimal(response.h);
    quote.low = to_decimal(response.l);
    quote.open = to_decimal(response.o);
    quote.previous_close = to_decimal(response.pc);

    Ok(quote.with_derived_change())
}

// ============================================================================
// FinnhubProvider
// ============================================================================

/// Finnhub market data provider.
///
/// Requires an API key; without one the provider is simply not constructed
/// and drops out of the chain.
pub struct FinnhubProvider {
    client: Client,
    api_key: String,
}

impl FinnhubProvider {
    /// Create a new Finnhub provider with the given API key.
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, api_key }
    }

    /// Make a GET request to the Finnhub API.
    async fn fetch(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        let url = format!("{}{}", BASE_URL, endpoint);

        debug!("Finnhub request: {} with {} params", endpoint, params.len());

        let response = self
            .client
            .get(&url)
            // API key as header, not query param, so it stays out of logs
            .header("X-Finnhub-Token", &self.api_key)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MarketDataError::Timeout {
                        provider: PROVIDER_ID.to_string(),
                    }
                } else {
                    MarketDataError::ProviderError {
                        provider: PROVIDER_ID.to_string(),
                        message: format!("Request failed: {}", e),
                    }
                }
            })?;

        let status = response.status();

        // 429 and 403 both mean the key's quota is spent
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(MarketDataError::UpstreamRateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: "Invalid or missing API key".to_string(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            if let Ok(ErrorResponse { error: Some(msg) }) = serde_json::from_str(&body) {
                return Err(MarketDataError::ProviderError {
                    provider: PROVIDER_ID.to_string(),
                    message: msg,
                });
            }

            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        response.text().await.map_err(|e| {
            MarketDataError::bad_response(PROVIDER_ID, format!("Failed to read response: {}", e))
        })
    }
}

#[async_trait]
impl MarketDataProvider for FinnhubProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            tier: ProviderTier::Fast,
            requires_api_key: true,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(60)
    }

    async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let body = self.fetch("/quote", &[("symbol", symbol)]).await?;
        parse_quote(symbol, &body, Utc::now())
    }
}
