//! Quote cache module.
//!
//! - [`types`] - Normalized symbol newtype
//! - [`model`] - Snapshots and the results handed back to callers
//! - [`store`] - Storage trait for snapshots
//! - [`memory_store`] - In-process store
//! - [`client`] - Market data client facade for the market-data crate
//! - [`config`] - Cache configuration and per-request options
//! - [`service`] - Cache-aside quote service
//! - [`constants`] - Provider identifiers
//!
//! # Architecture
//!
//! ```text
//! QuoteCacheService → MarketDataClient → market-data crate (providers)
//!       ↓                                       ↓
//! QuoteSnapshotStore (memory / SQLite)   ProviderRegistry
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod memory_store;
pub mod model;
pub mod service;
pub mod store;
pub mod types;


pub use client::{MarketDataClient, ProviderConfig};
pub use config::{QuoteCacheConfig, QuoteOptions, StalePolicy};
pub use memory_store::InMemorySnapshotStore;
pub use model::{QuoteResult, QuoteSnapshot};
pub use service::{MarketStatus, QuoteCacheService, QuoteCacheServiceTrait};
pub use store::QuoteSnapshotStore;
pub use types::Symbol;
