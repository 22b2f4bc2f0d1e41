//! SQLite storage implementation for the quote cache.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the `QuoteSnapshotStore` trait defined in `quotecache-core` and contains:
//! - Database connection pooling and management
//! - Diesel migrations
//! - The single-writer actor every write goes through
//! - Database-specific model types (with Diesel derives)
//!
//! # Architecture
//!
//! This crate is the only place in the application where Diesel dependencies exist.
//! `core` is database-agnostic and works with traits.
//!
//! ```text
//!          core (domain)
//!                  │
//!                  ▼
//!          storage-sqlite (this crate)
//!                  │
//!                  ▼
//!              SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod schema;

// Repository implementations
pub mod market_data;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection,
    DbPool, WriteHandle,
};

pub use market_data::SqliteSnapshotStore;

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

// Re-export from quotecache-core for convenience
pub use quotecache_core::errors::{DatabaseError, Error, Result};
