//! Strong types for the quote cache.
//!
//! - `Symbol` - Normalized ticker, the snapshot key

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ValidationError;

/// Longest ticker accepted.
pub const MAX_SYMBOL_LEN: usize = 10;

// =============================================================================
// Symbol
// =============================================================================

/// Normalized ticker symbol.
///
/// Examples: "AAPL", "BRK.B", "^GSPC", "EURUSD=X"
///
/// Always trimmed, uppercase, 1-10 characters from `[A-Z0-9.-^=]`. The only
/// way to build one is [`Symbol::parse`], so a `Symbol` is always a valid
/// snapshot key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Trim, uppercase and validate raw caller input.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let symbol = raw.trim().to_ascii_uppercase();

        if symbol.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        if symbol.chars().count() > MAX_SYMBOL_LEN {
            return Err(ValidationError::InvalidSymbol {
                symbol,
                reason: format!("longer than {} characters", MAX_SYMBOL_LEN),
            });
        }

        if let Some(bad) = symbol.chars().find(|c| !is_symbol_char(*c)) {
            return Err(ValidationError::InvalidSymbol {
                reason: format!("unexpected character '{}'", bad),
                symbol,
            });
        }

        Ok(Self(symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '.' | '-' | '^' | '=')
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Symbol {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Symbol> for String {
    fn from(s: Symbol) -> Self {
        s.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_normalizes() {
        assert_eq!(Symbol::parse("  aapl ").unwrap().as_str(), "AAPL");
        assert_eq!(Symbol::parse("brk.b").unwrap().as_str(), "BRK.B");
        assert_eq!(Symbol::parse("^gspc").unwrap().as_str(), "^GSPC");
        assert_eq!(Symbol::parse("eurusd=x").unwrap().as_str(), "EURUSD=X");
    }

    #[test]
    fn test_parse_rejects_misuse() {
        assert_eq!(Symbol::parse("   "), Err(ValidationError::EmptySymbol));
        assert!(matches!(
            Symbol::parse("ABCDEFGHIJK"),
            Err(ValidationError::InvalidSymbol { .. })
        ));
        assert!(matches!(
            Symbol::parse("AA PL"),
            Err(ValidationError::InvalidSymbol { .. })
        ));
        assert!(matches!(
            Symbol::parse("AAPL;DROP"),
            Err(ValidationError::InvalidSymbol { .. })
        ));
    }

    #[test]
    fn test_serde_validates() {
        let ok: Symbol = serde_json::from_str("\"msft\"").unwrap();
        assert_eq!(ok.as_str(), "MSFT");
        assert!(serde_json::from_str::<Symbol>("\"\"").is_err());
    }

    proptest! {
        #[test]
        fn parse_is_idempotent(raw in "[a-zA-Z0-9.^=-]{1,10}") {
            let once = Symbol::parse(&raw).unwrap();
            let twice = Symbol::parse(once.as_str()).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
