//! `gwo-cache` — the result cache shared by KPI and model computations.
//!
//! The cache is an explicitly owned object: whoever builds the engine owns
//! it, and it is dropped with the engine.

pub mod cache;

pub use cache::{CacheConfig, CacheStats, ResultCache, SweeperHandle};
pub use gwo_core::Fingerprint;
