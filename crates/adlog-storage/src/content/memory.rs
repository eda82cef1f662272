//! In-memory content store

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tracing::{debug, trace};

use adlog_core::{ContentAddress, ContentStore, ContentStoreError};

use super::DEFAULT_MAX_BLOB_SIZE;

/// In-memory implementation of [`ContentStore`]
///
/// Uses `DashMap` for concurrent access. Suitable for tests and simulation.
#[derive(Debug)]
pub struct MemoryContentStore {
    blobs: DashMap<ContentAddress, Bytes>,
    max_blob_size: u64,
    /// Simulated reachability of the store
    available: AtomicBool,
    /// Number of successful puts (including duplicates)
    puts: AtomicUsize,
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::with_max_blob_size(DEFAULT_MAX_BLOB_SIZE)
    }

    pub fn with_max_blob_size(max_blob_size: u64) -> Self {
        Self {
            blobs: DashMap::new(),
            max_blob_size,
            available: AtomicBool::new(true),
            puts: AtomicUsize::new(0),
        }
    }

    /// Simulate the store going down or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Drop a blob, simulating content loss behind a ledger record
    pub fn remove(&self, address: &ContentAddress) -> bool {
        self.blobs.remove(address).is_some()
    }

    pub fn contains(&self, address: &ContentAddress) -> bool {
        self.blobs.contains_key(address)
    }

    /// Number of distinct blobs stored
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Number of successful put calls
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), ContentStoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ContentStoreError::unavailable("memory content store offline"))
        }
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, data: Bytes) -> Result<ContentAddress, ContentStoreError> {
        self.check_available()?;

        let size = data.len() as u64;
        if size > self.max_blob_size {
            return Err(ContentStoreError::TooLarge {
                size,
                max: self.max_blob_size,
            });
        }

        let address = ContentAddress::from_content(&data);
        if self.blobs.contains_key(&address) {
            trace!(address = %address.short(), "Blob already stored");
        } else {
            self.blobs.insert(address.clone(), data);
            debug!(address = %address.short(), size, "Stored blob");
        }
        self.puts.fetch_add(1, Ordering::SeqCst);

        Ok(address)
    }

    async fn get(&self, address: &ContentAddress) -> Result<Bytes, ContentStoreError> {
        self.check_available()?;

        self.blobs
            .get(address)
            .map(|blob| blob.value().clone())
            .ok_or_else(|| ContentStoreError::NotFound(address.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryContentStore::new();
        let data = Bytes::from_static(b"{\"ip_address\":\"1.2.3.4\"}");

        let address = store.put(data.clone()).await.unwrap();
        assert!(address.is_well_formed());
        assert_eq!(store.get(&address).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let store = MemoryContentStore::new();

        let a = store.put(Bytes::from_static(b"same")).await.unwrap();
        let b = store.put(Bytes::from_static(b"same")).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
        assert_eq!(store.put_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_blob() {
        let store = MemoryContentStore::new();
        let address = ContentAddress::from_content(b"never stored");

        let err = store.get(&address).await.unwrap_err();
        assert!(matches!(err, ContentStoreError::NotFound(a) if a == address));
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = MemoryContentStore::new();
        store.set_available(false);

        let err = store.put(Bytes::from_static(b"x")).await.unwrap_err();
        assert!(matches!(err, ContentStoreError::Unavailable(_)));
        assert!(store.is_empty());
        assert_eq!(store.put_count(), 0);

        store.set_available(true);
        assert!(store.put(Bytes::from_static(b"x")).await.is_ok());
    }

    #[tokio::test]
    async fn test_size_limit() {
        let store = MemoryContentStore::with_max_blob_size(4);
        let err = store.put(Bytes::from_static(b"too big")).await.unwrap_err();
        assert!(matches!(err, ContentStoreError::TooLarge { size: 7, max: 4 }));
    }
}
