//! Cache backends
//!
//! A cache here is a disposable projection: every entry it holds can be
//! rebuilt from the ledger and the content store, so losing it costs only
//! latency.

mod memory;

pub use memory::{MemoryCache, MemoryCacheConfig};
