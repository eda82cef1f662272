//! Client contracts for the three backing systems
//!
//! The coordinator holds each client as an injected `Arc<dyn ...>`, so the
//! in-memory backends used in tests and the file-backed ones used by the CLI
//! are interchangeable with remote clients.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{CacheError, ContentStoreError, LedgerError};
use crate::event::{EventType, LedgerRecord};
use crate::ids::{ContentAddress, RecordId, SignerId};

/// Content-addressed blob storage
///
/// `put` must be idempotent by content: storing the same bytes twice
/// returns the same address and leaves a single copy.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store a blob and return its address
    async fn put(&self, data: Bytes) -> Result<ContentAddress, ContentStoreError>;

    /// Fetch a blob by address
    ///
    /// Returns [`ContentStoreError::NotFound`] if nothing is stored there.
    async fn get(&self, address: &ContentAddress) -> Result<Bytes, ContentStoreError>;
}

/// Append-only ledger of event records
///
/// Appends are sequenced per signer: each append must carry the signer's
/// next sequence number, otherwise it is rejected with
/// [`RejectReason::StaleSequence`](crate::RejectReason::StaleSequence).
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Next sequence number the ledger will accept from `signer`
    async fn next_sequence(&self, signer: &SignerId) -> Result<u64, LedgerError>;

    /// Append a record and return its identifier
    ///
    /// The identifier is provisional until [`await_finality`](Self::await_finality)
    /// succeeds for it.
    async fn append(
        &self,
        signer: &SignerId,
        sequence: u64,
        event_type: EventType,
        address: &ContentAddress,
    ) -> Result<RecordId, LedgerError>;

    /// Wait until the record is final, for at most `timeout`
    async fn await_finality(&self, record_id: &RecordId, timeout: Duration)
    -> Result<(), LedgerError>;

    /// Fetch a finalized record
    async fn get(&self, record_id: &RecordId) -> Result<LedgerRecord, LedgerError>;

    /// Finalized records in submission order, starting after `after`
    async fn scan(
        &self,
        after: Option<&RecordId>,
        limit: usize,
    ) -> Result<Vec<LedgerRecord>, LedgerError>;
}

/// TTL key-value namespace with score-ordered indexes
///
/// No consistency guarantee beyond eventually reflecting writes within the
/// TTL. Callers must tolerate an empty cache at any time.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch an unexpired value
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Store a value that expires after `ttl`
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;

    /// Drop a value; returns whether one was present
    async fn expire(&self, key: &str) -> Result<bool, CacheError>;

    /// Insert or re-score a member of an index
    async fn index_add(&self, index: &str, member: &str, score: i64) -> Result<(), CacheError>;

    /// Members ordered by descending score, skipping `offset`, at most `count`
    async fn index_range(
        &self,
        index: &str,
        offset: usize,
        count: usize,
    ) -> Result<Vec<String>, CacheError>;

    /// Remove a member from an index; returns whether it was present
    async fn index_remove(&self, index: &str, member: &str) -> Result<bool, CacheError>;
}
