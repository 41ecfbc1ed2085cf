//! Adapters
//!
//! In-process implementations of the ledger's external collaborators. They
//! back the CLI and the test suite; a deployment swaps them for a networked
//! cache and a live rate source behind the same traits.

pub mod memory_cache;
pub mod static_rates;

pub use memory_cache::InMemoryCache;
pub use static_rates::{RateSpec, StaticRates};
