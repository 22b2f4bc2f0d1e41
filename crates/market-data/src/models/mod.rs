//! Market data models
//!
//! - `types` - Type aliases for common identifiers (ProviderId)
//! - `quote` - The normalized quote every provider maps into

mod quote;
mod types;

pub use quote::Quote;
pub use types::ProviderId;
