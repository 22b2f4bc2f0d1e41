//! Quote Cache Core - Domain types, services, and traits.
//!
//! Serves stock quotes from a per-symbol snapshot store and refreshes them
//! through the provider chain in `quotecache-market-data`. It is
//! database-agnostic; the `storage-sqlite` crate implements the store.

pub mod errors;
pub mod quotes;

pub use quotes::*;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
