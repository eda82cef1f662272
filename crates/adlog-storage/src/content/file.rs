//! File-backed content store
//!
//! Blobs live under `base_dir`, sharded by the leading hex pairs of their
//! address (`ab/cd/abcdef...`). Writes go to a temp file and are renamed
//! into place, so a reader never sees a partial blob.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

use adlog_core::{ContentAddress, ContentStore, ContentStoreError};

use super::DEFAULT_MAX_BLOB_SIZE;

/// Configuration for the file content store
#[derive(Debug, Clone)]
pub struct FileContentStoreConfig {
    /// Base directory for blob storage
    pub base_dir: PathBuf,
    /// Number of subdirectory levels (for sharding)
    pub shard_depth: u8,
    /// Maximum blob size (bytes)
    pub max_blob_size: u64,
}

impl Default for FileContentStoreConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./data/content"),
            shard_depth: 2,
            max_blob_size: DEFAULT_MAX_BLOB_SIZE,
        }
    }
}

impl FileContentStoreConfig {
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }
}

/// Content-addressed blob store on the local filesystem
pub struct FileContentStore {
    config: FileContentStoreConfig,
}

impl FileContentStore {
    /// Open the store, creating its directory if needed
    pub async fn open(config: FileContentStoreConfig) -> Result<Self, ContentStoreError> {
        fs::create_dir_all(&config.base_dir).await?;

        info!(path = %config.base_dir.display(), "Content store initialized");

        Ok(Self { config })
    }

    /// Check if content exists
    pub async fn exists(&self, address: &ContentAddress) -> bool {
        address.is_well_formed() && fs::try_exists(self.blob_path(address)).await.unwrap_or(false)
    }

    /// Get the file path for an address
    ///
    /// Only called with well-formed addresses, so the path cannot escape
    /// `base_dir`.
    fn blob_path(&self, address: &ContentAddress) -> PathBuf {
        let hex = address.as_str();
        let mut path = self.config.base_dir.clone();

        for i in 0..self.config.shard_depth as usize {
            let start = i * 2;
            let end = start + 2;
            if end <= hex.len() {
                path.push(&hex[start..end]);
            }
        }

        path.push(hex);
        path
    }
}

#[async_trait]
impl ContentStore for FileContentStore {
    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn put(&self, data: Bytes) -> Result<ContentAddress, ContentStoreError> {
        let size = data.len() as u64;
        if size > self.config.max_blob_size {
            return Err(ContentStoreError::TooLarge {
                size,
                max: self.config.max_blob_size,
            });
        }

        let address = ContentAddress::from_content(&data);
        if self.exists(&address).await {
            debug!(address = %address.short(), "Blob already exists");
            return Ok(address);
        }

        let path = self.blob_path(&address);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = path.with_extension("tmp");
        let mut file = File::create(&temp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &path).await?;

        debug!(address = %address.short(), "Stored blob");
        Ok(address)
    }

    #[instrument(skip(self), fields(address = %address.short()))]
    async fn get(&self, address: &ContentAddress) -> Result<Bytes, ContentStoreError> {
        if !address.is_well_formed() {
            return Err(ContentStoreError::NotFound(address.clone()));
        }

        let mut file = File::open(self.blob_path(address)).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ContentStoreError::NotFound(address.clone())
            } else {
                ContentStoreError::Unavailable(e.to_string())
            }
        })?;

        let mut data = Vec::new();
        file.read_to_end(&mut data).await?;

        if !address.matches(&data) {
            warn!(expected = %address, "Blob hash mismatch");
            return Err(ContentStoreError::Corrupted {
                address: address.clone(),
                reason: "hash mismatch".into(),
            });
        }

        Ok(Bytes::from(data))
    }
}
