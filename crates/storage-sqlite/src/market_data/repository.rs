use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use log::debug;
use std::sync::Arc;

use super::model::QuoteSnapshotDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::quote_snapshots::dsl as snapshots_dsl;
use quotecache_core::quotes::{QuoteSnapshot, QuoteSnapshotStore};
use quotecache_core::Result;

/// Snapshot store backed by the `quote_snapshots` table.
///
/// Reads take a pooled connection; writes go through the writer actor.
pub struct SqliteSnapshotStore {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl SqliteSnapshotStore {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl QuoteSnapshotStore for SqliteSnapshotStore {
    fn get(&self, symbol: &str) -> Result<Option<QuoteSnapshot>> {
        let mut conn = get_connection(&self.pool)?;

        let row = snapshots_dsl::quote_snapshots
            .find(symbol)
            .select(QuoteSnapshotDB::as_select())
            .first::<QuoteSnapshotDB>(&mut conn)
            .optional()
            .into_core()?;

        match row {
            Some(row) => Ok(Some(QuoteSnapshot::try_from(row)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, snapshot: QuoteSnapshot) -> Result<QuoteSnapshot> {
        let db_row = QuoteSnapshotDB::try_from(&snapshot)?;

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::replace_into(snapshots_dsl::quote_snapshots)
                    .values(&db_row)
                    .execute(conn)
                    .map_err(StorageError::QueryFailed)?;
                Ok(())
            })
            .await?;

        debug!("Stored snapshot for {}", snapshot.symbol);
        Ok(snapshot)
    }

    async fn clear(&self, symbol: &str) -> Result<usize> {
        let symbol = symbol.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                diesel::delete(snapshots_dsl::quote_snapshots.find(symbol))
                    .execute(conn)
                    .into_core()
            })
            .await
    }

    async fn clear_all(&self) -> Result<usize> {
        self.writer
            .exec(|conn: &mut SqliteConnection| -> Result<usize> {
                diesel::delete(snapshots_dsl::quote_snapshots)
                    .execute(conn)
                    .into_core()
            })
            .await
    }

    fn count(&self) -> Result<usize> {
        let mut conn = get_connection(&self.pool)?;
        let count: i64 = snapshots_dsl::quote_snapshots
            .count()
            .get_result(&mut conn)
            .into_core()?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations, spawn_writer};
    use chrono::{TimeZone, Utc};
    use quotecache_core::errors::{DatabaseError, Error};
    use quotecache_core::quotes::Symbol;
    use quotecache_market_data::Quote;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    /// Creates a store over a fresh temp database.
    /// Returns the store, pool and temp dir (to keep it alive).
    fn create_test_store() -> (
        SqliteSnapshotStore,
        Arc<Pool<ConnectionManager<SqliteConnection>>>,
        tempfile::TempDir,
    ) {
        let temp_dir = tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");
        let db_path_str = db_path.to_string_lossy().to_string();

        let pool = create_pool(&db_path_str).expect("Failed to create pool");
        run_migrations(&pool).expect("Failed to run migrations");
        let writer = spawn_writer(&pool).expect("Failed to spawn writer");

        (SqliteSnapshotStore::new(Arc::clone(&pool), writer), pool, temp_dir)
    }

    fn snapshot(symbol: &str, price: Decimal, ttl: u32) -> QuoteSnapshot {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap();
        let symbol = Symbol::parse(symbol).unwrap();
        QuoteSnapshot::new(
            &symbol,
            Quote::new(symbol.as_str(), price, "FINNHUB", at),
            at,
            ttl,
        )
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let (store, _pool, _temp_dir) = create_test_store();

        assert!(store.get("AAPL").unwrap().is_none());

        let saved = store.upsert(snapshot("AAPL", dec!(150.25), 60)).await.unwrap();
        let loaded = store.get("AAPL").unwrap().unwrap();

        assert_eq!(loaded, saved);
        assert_eq!(loaded.payload.price, dec!(150.25));
        assert_eq!(loaded.ttl_seconds, 60);
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_row() {
        let (store, _pool, _temp_dir) = create_test_store();

        store.upsert(snapshot("AAPL", dec!(150.25), 60)).await.unwrap();
        store.upsert(snapshot("AAPL", dec!(151.00), 600)).await.unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let loaded = store.get("AAPL").unwrap().unwrap();
        assert_eq!(loaded.payload.price, dec!(151.00));
        assert_eq!(loaded.ttl_seconds, 600);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let (store, _pool, _temp_dir) = create_test_store();

        store.upsert(snapshot("AAPL", dec!(1), 60)).await.unwrap();
        store.upsert(snapshot("MSFT", dec!(2), 60)).await.unwrap();
        store.upsert(snapshot("GOOG", dec!(3), 60)).await.unwrap();

        assert_eq!(store.clear("AAPL").await.unwrap(), 1);
        assert_eq!(store.clear("AAPL").await.unwrap(), 0);
        assert_eq!(store.count().unwrap(), 2);

        assert_eq!(store.clear_all().await.unwrap(), 2);
        assert_eq!(store.clear_all().await.unwrap(), 0);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_row_surfaces_as_error() {
        let (store, pool, _temp_dir) = create_test_store();
        let mut conn = get_connection(&pool).expect("Failed to get connection");
        diesel::sql_query(
            "INSERT INTO quote_snapshots (symbol, price, payload, data_source, fetched_at, ttl_seconds) \
             VALUES ('AAPL', '1', 'garbage', 'FINNHUB', '2024-03-04T15:00:00+00:00', 60)",
        )
        .execute(&mut conn)
        .expect("Failed to insert row");

        let err = store.get("AAPL").unwrap_err();
        assert!(matches!(err, Error::Database(DatabaseError::CorruptRecord(_))));
    }

    #[tokio::test]
    async fn test_concurrent_upserts_keep_one_row() {
        let (store, _pool, _temp_dir) = create_test_store();
        let store = Arc::new(store);

        let writes = (1..=20).map(|i| {
            let store = store.clone();
            async move {
                store
                    .upsert(snapshot("AAPL", Decimal::from(i), 60))
                    .await
            }
        });
        for result in futures::future::join_all(writes).await {
            result.unwrap();
        }

        assert_eq!(store.count().unwrap(), 1);
    }
}
