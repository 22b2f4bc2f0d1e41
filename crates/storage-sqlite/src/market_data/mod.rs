//! SQLite storage implementation for quote snapshots.

mod model;
mod repository;

pub use model::QuoteSnapshotDB;
pub use repository::SqliteSnapshotStore;

// Re-export trait from core for convenience
pub use quotecache_core::quotes::QuoteSnapshotStore;
