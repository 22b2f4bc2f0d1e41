//! Property-based integration tests for the quote cache.
//!
//! These tests verify that universal properties hold across all valid inputs,
//! using the `proptest` crate for random test case generation.

use chrono::{Duration, TimeZone, Utc};
use futures::executor::block_on;
use proptest::prelude::*;
use quotecache_core::quotes::{
    InMemorySnapshotStore, QuoteResult, QuoteSnapshot, QuoteSnapshotStore, Symbol,
};
use quotecache_market_data::Quote;
use rust_decimal::Decimal;
use std::collections::HashMap;

// =============================================================================
// Generators
// =============================================================================

/// Generates a valid raw ticker, in any case, with surrounding whitespace.
fn arb_raw_symbol() -> impl Strategy<Value = String> {
    ("[A-Za-z]{1,5}(\\.[A-Za-z])?", " {0,2}", " {0,2}")
        .prop_map(|(ticker, lead, trail)| format!("{}{}{}", lead, ticker, trail))
}

/// Generates a snapshot for one of a handful of symbols.
fn arb_snapshot() -> impl Strategy<Value = QuoteSnapshot> {
    (
        prop_oneof![Just("AAPL"), Just("MSFT"), Just("GOOG"), Just("BRK.B")],
        1i64..1_000_000,
        0i64..86_400,
        prop_oneof![Just(60u32), Just(300u32), Just(600u32)],
    )
        .prop_map(|(symbol, cents, offset, ttl)| {
            let symbol = Symbol::parse(symbol).unwrap();
            let at = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap() + Duration::seconds(offset);
            let quote = Quote::new(symbol.as_str(), Decimal::new(cents, 2), "FINNHUB", at);
            QuoteSnapshot::new(&symbol, quote, at, ttl)
        })
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    /// Any case or padding of a ticker normalizes to the same symbol.
    #[test]
    fn prop_symbol_normalization_collapses_variants(raw in arb_raw_symbol()) {
        let lower = Symbol::parse(&raw.to_lowercase()).unwrap();
        let upper = Symbol::parse(&raw.to_uppercase()).unwrap();
        prop_assert_eq!(&lower, &upper);
        prop_assert_eq!(lower.as_str(), raw.trim().to_uppercase());
    }

    /// Freshness flips exactly at `expires_at`.
    #[test]
    fn prop_fresh_until_expiry(snapshot in arb_snapshot(), offset in -10i64..1_000) {
        let now = snapshot.fetched_at + Duration::seconds(offset);
        prop_assert_eq!(snapshot.is_fresh(now), now < snapshot.expires_at());
    }

    /// However many writes happen, the store keeps one row per symbol and
    /// that row is the last one written.
    #[test]
    fn prop_at_most_one_snapshot_per_symbol(writes in proptest::collection::vec(arb_snapshot(), 1..40)) {
        let store = InMemorySnapshotStore::new();
        let mut last: HashMap<String, QuoteSnapshot> = HashMap::new();

        for snapshot in writes {
            last.insert(snapshot.symbol.clone(), snapshot.clone());
            block_on(store.upsert(snapshot)).unwrap();
        }

        prop_assert_eq!(store.count().unwrap(), last.len());
        for (symbol, expected) in &last {
            let stored = store.get(symbol).unwrap();
            prop_assert_eq!(stored.as_ref(), Some(expected));
        }
    }

    /// An unavailable result never carries a price.
    #[test]
    fn prop_unavailable_never_has_quote(symbol in "[A-Z]{1,5}", message in "[a-z ]{0,40}") {
        let result = QuoteResult::unavailable(symbol, message);
        let json = serde_json::to_value(&result).unwrap();
        prop_assert!(json.get("quote").is_none());
        prop_assert_eq!(json["unavailable"].as_bool(), Some(true));
    }
}
