//! Quote snapshot storage trait.
//!
//! This trait abstracts the persistence layer, allowing different storage
//! backends (in-memory, SQLite) to be used interchangeably by the service.

use async_trait::async_trait;

use super::model::QuoteSnapshot;
use crate::errors::Result;

/// Storage interface for quote snapshots.
///
/// # Design Notes
///
/// - Keyed by normalized symbol; at most one snapshot per symbol
/// - `upsert` replaces the whole row, never merges fields
/// - Reads are sync, writes are async (they may go through a writer actor)
/// - Clears are idempotent: clearing a missing symbol is not an error
#[async_trait]
pub trait QuoteSnapshotStore: Send + Sync {
    /// Current snapshot for a symbol, fresh or not.
    fn get(&self, symbol: &str) -> Result<Option<QuoteSnapshot>>;

    /// Insert or replace the snapshot for `snapshot.symbol`.
    async fn upsert(&self, snapshot: QuoteSnapshot) -> Result<QuoteSnapshot>;

    /// Remove the snapshot for a symbol. Returns the number of rows removed.
    async fn clear(&self, symbol: &str) -> Result<usize>;

    /// Remove every snapshot. Returns the number of rows removed.
    async fn clear_all(&self) -> Result<usize>;

    /// Number of stored snapshots.
    fn count(&self) -> Result<usize>;
}
