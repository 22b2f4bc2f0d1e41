//! Database model for quote snapshots.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::StorageError;
use quotecache_core::quotes::QuoteSnapshot;

/// Database model for quote snapshots
///
/// `price` duplicates `payload.price` so the table can be inspected without
/// decoding JSON; `payload` is what gets read back.
#[derive(
    Queryable,
    Identifiable,
    Selectable,
    Insertable,
    AsChangeset,
    Debug,
    Clone,
    Serialize,
    Deserialize,
    PartialEq,
)]
#[diesel(table_name = crate::schema::quote_snapshots)]
#[diesel(primary_key(symbol))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct QuoteSnapshotDB {
    pub symbol: String,
    pub price: String,
    pub payload: String,
    pub data_source: String,
    pub fetched_at: String,
    pub ttl_seconds: i32,
}

impl TryFrom<&QuoteSnapshot> for QuoteSnapshotDB {
    type Error = StorageError;

    fn try_from(snapshot: &QuoteSnapshot) -> Result<Self, Self::Error> {
        let payload = serde_json::to_string(&snapshot.payload)
            .map_err(|e| StorageError::CorruptRecord(format!("{}: {}", snapshot.symbol, e)))?;
        let ttl_seconds = i32::try_from(snapshot.ttl_seconds).map_err(|_| {
            StorageError::CorruptRecord(format!(
                "{}: TTL {} out of range",
                snapshot.symbol, snapshot.ttl_seconds
            ))
        })?;

        Ok(Self {
            symbol: snapshot.symbol.clone(),
            price: snapshot.payload.price.to_string(),
            payload,
            data_source: snapshot.data_source.clone(),
            fetched_at: snapshot.fetched_at.to_rfc3339(),
            ttl_seconds,
        })
    }
}

impl TryFrom<QuoteSnapshotDB> for QuoteSnapshot {
    type Error = StorageError;

    fn try_from(db: QuoteSnapshotDB) -> Result<Self, Self::Error> {
        let corrupt = |what: String| StorageError::CorruptRecord(format!("{}: {}", db.symbol, what));

        let payload = serde_json::from_str(&db.payload).map_err(|e| corrupt(e.to_string()))?;
        let fetched_at = DateTime::parse_from_rfc3339(&db.fetched_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| corrupt(format!("fetched_at: {}", e)))?;
        let ttl_seconds =
            u32::try_from(db.ttl_seconds).map_err(|_| corrupt("negative TTL".to_string()))?;
        Decimal::from_str(&db.price).map_err(|e| corrupt(format!("price: {}", e)))?;

        Ok(QuoteSnapshot {
            symbol: db.symbol,
            payload,
            fetched_at,
            ttl_seconds,
            data_source: db.data_source,
        })
    }
}
