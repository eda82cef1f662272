//! # Adlog Storage
//!
//! Reference backends implementing the client contracts from `adlog-core`.
//!
//! ## Backends
//!
//! - **MemoryContentStore** / **FileContentStore**: content-addressed blobs (BLAKE3)
//! - **MemoryLedger**: in-process ledger with per-signer sequencing and simulated finality
//! - **FileLedger**: append-only, length-prefixed postcard log, replayed on open
//! - **MemoryCache**: TTL entries plus score-ordered indexes
//!
//! The in-memory backends carry an availability switch so tests and
//! simulations can exercise outage handling in the coordinator.
//!
//! ## Example
//!
//! ```rust,ignore
//! use adlog_core::ContentStore;
//! use adlog_storage::MemoryContentStore;
//!
//! let store = MemoryContentStore::new();
//! let address = store.put(Bytes::from_static(b"{}")).await?;
//! assert_eq!(store.get(&address).await?, Bytes::from_static(b"{}"));
//! ```

pub mod cache;
pub mod content;
pub mod ledger;

pub use cache::{MemoryCache, MemoryCacheConfig};
pub use content::{FileContentStore, FileContentStoreConfig, MemoryContentStore};
pub use ledger::{FileLedger, FileLedgerConfig, MemoryLedger, MemoryLedgerConfig};
