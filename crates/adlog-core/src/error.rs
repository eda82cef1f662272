//! Error types for the backing-system clients
//!
//! Each client contract has its own error enum so the coordinator can map
//! failures onto distinct, caller-visible kinds.

use thiserror::Error;

use crate::ids::{ContentAddress, RecordId};

/// Returned when an event type name or code is not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown event type: {0}")]
pub struct UnknownEventType(pub String);

/// Errors from a content store client
#[derive(Debug, Error)]
pub enum ContentStoreError {
    #[error("Content store unavailable: {0}")]
    Unavailable(String),

    #[error("Content not found: {0}")]
    NotFound(ContentAddress),

    /// Stored bytes no longer hash to their address
    #[error("Content corrupted at {address}: {reason}")]
    Corrupted {
        address: ContentAddress,
        reason: String,
    },

    #[error("Content too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },
}

impl ContentStoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

impl From<std::io::Error> for ContentStoreError {
    fn from(err: std::io::Error) -> Self {
        ContentStoreError::Unavailable(err.to_string())
    }
}

/// Why the ledger refused an append
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// The submitted sequence number is not the signer's next one
    #[error("stale sequence number: expected {expected}, got {got}")]
    StaleSequence { expected: u64, got: u64 },

    #[error("invalid submission: {0}")]
    Invalid(String),
}

/// Errors from a ledger client
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Ledger rejected submission: {0}")]
    Rejected(RejectReason),

    #[error("Ledger record not found: {0}")]
    NotFound(RecordId),

    #[error("Finality not observed for {0} before timeout")]
    FinalityTimeout(RecordId),

    #[error("Ledger storage corrupted: {0}")]
    Corrupted(String),
}

impl LedgerError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Unavailable(err.to_string())
    }
}

/// Errors from a cache client
///
/// The coordinator never propagates these; it logs them and falls back to
/// the ledger and content store.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

impl CacheError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_store_error_display() {
        let err = ContentStoreError::NotFound(ContentAddress::new("abc123"));
        assert!(err.to_string().contains("abc123"));

        let err = ContentStoreError::TooLarge { size: 10, max: 5 };
        let msg = err.to_string();
        assert!(msg.contains("10"));
        assert!(msg.contains("5"));
    }

    #[test]
    fn test_reject_reason_display() {
        let err = LedgerError::Rejected(RejectReason::StaleSequence {
            expected: 4,
            got: 3,
        });
        let msg = err.to_string();
        assert!(msg.contains("expected 4"));
        assert!(msg.contains("got 3"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(
            ContentStoreError::from(io_err),
            ContentStoreError::Unavailable(_)
        ));

        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        assert!(matches!(LedgerError::from(io_err), LedgerError::Unavailable(_)));
    }

    #[test]
    fn test_cache_error_from_json() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(matches!(CacheError::from(json_err), CacheError::Serialization(_)));
    }
}
