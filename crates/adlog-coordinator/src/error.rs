//! Caller-facing errors for the event coordinator
//!
//! A write either succeeds, fails before any ledger side effect
//! (`ContentStoreUnavailable`, `LedgerUnavailable`, `LedgerRejected`), or
//! ends indeterminate. An indeterminate write must not be resubmitted from
//! scratch: `LedgerFinalityTimeout` carries a resumable id, and
//! `LedgerAppendIndeterminate` means the append went unanswered and may
//! still land under the returned address. Cache failures never appear here.

use thiserror::Error;

use adlog_core::{ContentAddress, ContentStoreError, LedgerError, RecordId, RejectReason};

/// Errors returned by [`EventCoordinator`](crate::EventCoordinator)
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Content store unavailable: {0}")]
    ContentStoreUnavailable(String),

    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Rejected twice, the second time with a freshly fetched sequence
    #[error("Ledger rejected submission: {0}")]
    LedgerRejected(RejectReason),

    /// The append happened but finality was not observed in time.
    ///
    /// Not a failure: poll with `get_event` or call `resume_event`.
    #[error("Finality not observed for {record_id} (address {address})")]
    LedgerFinalityTimeout {
        record_id: RecordId,
        address: ContentAddress,
    },

    /// The append was sent but not answered in time; it may have landed.
    ///
    /// Look for a ledger record referencing `address` before retrying.
    #[error("Append for {address} unanswered: {reason}")]
    LedgerAppendIndeterminate {
        address: ContentAddress,
        reason: String,
    },

    #[error("Event not found: {0}")]
    NotFound(RecordId),

    /// The ledger has the record but its metadata cannot be retrieved
    #[error("Metadata missing for {record_id} at {address}: {reason}")]
    MetadataMissing {
        record_id: RecordId,
        address: ContentAddress,
        reason: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Discriminant callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ContentStoreUnavailable,
    LedgerUnavailable,
    LedgerRejected,
    LedgerFinalityTimeout,
    LedgerAppendIndeterminate,
    NotFound,
    MetadataMissing,
    InvalidRequest,
    Config,
    Internal,
}

impl CoordinatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ContentStoreUnavailable(_) => ErrorKind::ContentStoreUnavailable,
            Self::LedgerUnavailable(_) => ErrorKind::LedgerUnavailable,
            Self::LedgerRejected(_) => ErrorKind::LedgerRejected,
            Self::LedgerFinalityTimeout { .. } => ErrorKind::LedgerFinalityTimeout,
            Self::LedgerAppendIndeterminate { .. } => ErrorKind::LedgerAppendIndeterminate,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::MetadataMissing { .. } => ErrorKind::MetadataMissing,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Config(_) => ErrorKind::Config,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True when a ledger side effect may have happened
    pub fn is_indeterminate(&self) -> bool {
        matches!(
            self,
            Self::LedgerFinalityTimeout { .. } | Self::LedgerAppendIndeterminate { .. }
        )
    }

    /// Record id the caller can poll or resume, when one is known
    pub fn record_id(&self) -> Option<&RecordId> {
        match self {
            Self::LedgerFinalityTimeout { record_id, .. } => Some(record_id),
            _ => None,
        }
    }

    /// Map a content-store failure on the write path
    pub(crate) fn from_content_put(err: ContentStoreError) -> Self {
        match err {
            ContentStoreError::TooLarge { size, max } => {
                Self::InvalidRequest(format!("metadata too large: {size} bytes (max {max})"))
            }
            other => Self::ContentStoreUnavailable(other.to_string()),
        }
    }

    /// Map a ledger failure outside the append retry loop
    pub(crate) fn from_ledger(err: LedgerError) -> Self {
        match err {
            LedgerError::Unavailable(msg) => Self::LedgerUnavailable(msg),
            LedgerError::Rejected(reason) => Self::LedgerRejected(reason),
            LedgerError::NotFound(id) => Self::NotFound(id),
            LedgerError::FinalityTimeout(id) => {
                Self::Internal(format!("unexpected finality timeout for {id}"))
            }
            LedgerError::Corrupted(msg) => Self::Internal(format!("ledger corrupted: {msg}")),
        }
    }
}

/// Result type alias for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indeterminate_outcomes() {
        let record_id = RecordId::new("0000000000000001-abcdef0123456789");
        let timeout = CoordinatorError::LedgerFinalityTimeout {
            record_id: record_id.clone(),
            address: ContentAddress::from_content(b"m"),
        };
        assert!(timeout.is_indeterminate());
        assert_eq!(timeout.record_id(), Some(&record_id));
        assert_eq!(timeout.kind(), ErrorKind::LedgerFinalityTimeout);

        let unanswered = CoordinatorError::LedgerAppendIndeterminate {
            address: ContentAddress::from_content(b"m"),
            reason: "no answer".into(),
        };
        assert!(unanswered.is_indeterminate());
        assert_eq!(unanswered.record_id(), None);
        assert_eq!(unanswered.kind(), ErrorKind::LedgerAppendIndeterminate);

        let unavailable = CoordinatorError::LedgerUnavailable("refused".into());
        assert!(!unavailable.is_indeterminate());

        let not_found = CoordinatorError::NotFound(record_id);
        assert!(!not_found.is_indeterminate());
        assert_eq!(not_found.record_id(), None);
    }

    #[test]
    fn test_ledger_mapping() {
        let err = CoordinatorError::from_ledger(LedgerError::unavailable("down"));
        assert_eq!(err.kind(), ErrorKind::LedgerUnavailable);

        let err = CoordinatorError::from_ledger(LedgerError::NotFound(RecordId::new("x")));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = CoordinatorError::from_ledger(LedgerError::Corrupted("bad".into()));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_content_put_mapping() {
        let err = CoordinatorError::from_content_put(ContentStoreError::unavailable("down"));
        assert_eq!(err.kind(), ErrorKind::ContentStoreUnavailable);

        let err = CoordinatorError::from_content_put(ContentStoreError::TooLarge { size: 9, max: 1 });
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }
}
