//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - Provider capabilities, chain tiers and rate limiting configuration
//! - Concrete provider implementations (Finnhub, Alpha Vantage, Yahoo)
//!
//! # Architecture
//!
//! The provider system is designed to be:
//! - **Provider-agnostic**: The registry doesn't know about specific providers
//! - **Extensible**: New providers are added by implementing `MarketDataProvider`,
//!   never by branching on a provider name
//! - **Resilient**: Rate limiting, response caching and circuit breakers wrap
//!   every call in the registry
//!
//! Providers receive an already-normalized uppercase symbol and return a
//! normalized [`Quote`](crate::models::Quote).

mod capabilities;
mod traits;

pub mod alpha_vantage;
pub mod finnhub;
pub mod yahoo;

pub use capabilities::{ProviderCapabilities, ProviderTier, RateLimit};
pub use traits::MarketDataProvider;
