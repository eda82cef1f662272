//! Content-addressed blob storage
//!
//! Blobs are addressed by the BLAKE3 hash of their bytes, which makes `put`
//! idempotent and lets `get` verify what it returns.

mod file;
mod memory;

pub use file::{FileContentStore, FileContentStoreConfig};
pub use memory::MemoryContentStore;

/// Default upper bound on a single blob
pub const DEFAULT_MAX_BLOB_SIZE: u64 = 16 * 1024 * 1024;
