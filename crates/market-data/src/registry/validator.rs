//! Quote data validation.
//!
//! Every quote a provider returns goes through the validator before it is
//! cached or handed to the caller. Hard failures reject the quote and the
//! chain moves on to the next provider; soft issues are only logged.
//!
//! Checks:
//! - price strictly positive
//! - high >= low, no negative OHLC values or volume
//! - price below a sanity ceiling
//! - zero volume (soft)

use log::warn;
use rust_decimal::Decimal;

use crate::errors::MarketDataError;
use crate::models::Quote;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Reject the quote, try the next provider.
    Hard,
    /// Accept the quote, log a warning.
    Soft,
}

#[derive(Clone, Debug)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub message: String,
}

impl ValidationIssue {
    fn hard(message: String) -> Self {
        Self {
            severity: ValidationSeverity::Hard,
            message,
        }
    }

    fn soft(message: String) -> Self {
        Self {
            severity: ValidationSeverity::Soft,
            message,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    pub reject_invalid_ohlc: bool,
    /// Prices above this are treated as garbage from the provider.
    pub max_price: Option<Decimal>,
    pub warn_on_zero_volume: bool,
    /// Soft-warn when the day range doesn't contain the price.
    pub warn_on_price_outside_range: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            reject_invalid_ohlc: true,
            max_price: Some(Decimal::from(1_000_000_000i64)),
            warn_on_zero_volume: true,
            warn_on_price_outside_range: true,
        }
    }
}

pub struct QuoteValidator {
    config: ValidatorConfig,
}

impl QuoteValidator {
    pub fn new() -> Self {
        Self::with_config(ValidatorConfig::default())
    }

    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Run every check and return all issues found.
    pub fn inspect(&self, quote: &Quote) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        self.check_price(quote, &mut issues);
        self.check_day_range(quote, &mut issues);
        self.check_volume(quote, &mut issues);
        issues
    }

    /// Ok if the quote has no hard issues. Soft issues are logged.
    pub fn validate(&self, quote: &Quote) -> Result<(), MarketDataError> {
        let issues = self.inspect(quote);

        let hard: Vec<&str> = issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Hard)
            .map(|i| i.message.as_str())
            .collect();

        if !hard.is_empty() {
            return Err(MarketDataError::ValidationFailed {
                message: format!("{} from {}: {}", quote.symbol, quote.data_source, hard.join("; ")),
            });
        }

        for issue in issues.iter().filter(|i| i.severity == ValidationSeverity::Soft) {
            warn!(
                "Quote validation warning for {} ({}): {}",
                quote.symbol, quote.data_source, issue.message
            );
        }

        Ok(())
    }

    fn check_price(&self, quote: &Quote, issues: &mut Vec<ValidationIssue>) {
        if quote.price <= Decimal::ZERO {
            issues.push(ValidationIssue::hard(format!(
                "Non-positive price: {}",
                quote.price
            )));
        }

        if let Some(max) = self.config.max_price {
            if quote.price > max {
                issues.push(ValidationIssue::hard(format!(
                    "Price {} exceeds sanity limit {}",
                    quote.price, max
                )));
            }
        }
    }

    fn check_day_range(&self, quote: &Quote, issues: &mut Vec<ValidationIssue>) {
        for (name, value) in [
            ("open", quote.open),
            ("high", quote.high),
            ("low", quote.low),
            ("previous close", quote.previous_close),
        ] {
            if let Some(v) = value {
                if v < Decimal::ZERO {
                    issues.push(ValidationIssue::hard(format!("Negative {}: {}", name, v)));
                }
            }
        }

        let (Some(high), Some(low)) = (quote.high, quote.low) else {
            return;
        };

        if self.config.reject_invalid_ohlc && high < low {
            issues.push(ValidationIssue::hard(format!(
                "High ({}) is less than Low ({})",
                high, low
            )));
            return;
        }

        // Providers quote the day range with a lag, so this is informational
        if self.config.warn_on_price_outside_range && (quote.price < low || quote.price > high) {
            issues.push(ValidationIssue::soft(format!(
                "Price ({}) is outside day range ({}-{})",
                quote.price, low, high
            )));
        }
    }

    fn check_volume(&self, quote: &Quote, issues: &mut Vec<ValidationIssue>) {
        let Some(volume) = quote.volume else {
            return;
        };

        if volume < Decimal::ZERO {
            issues.push(ValidationIssue::hard(format!("Negative volume: {}", volume)));
        } else if self.config.warn_on_zero_volume && volume.is_zero() {
            issues.push(ValidationIssue::soft(
                "Zero volume (market may be closed)".to_string(),
            ));
        }
    }
}

impl Default for QuoteValidator {
    fn default() -> Self {
        Self::new()
    }
}
