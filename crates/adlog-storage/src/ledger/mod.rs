//! Append-only ledgers
//!
//! Both ledgers enforce per-signer sequencing: an append must carry exactly
//! the signer's next sequence number. Record identifiers embed the
//! ledger-global position, so they sort in submission order.
//!
//! ## Storage Format (FileLedger)
//!
//! Length-prefixed, postcard-serialized [`LedgerRecord`]s:
//! ```text
//! [4 bytes: len][len bytes: serialized record][4 bytes: len][...]
//! ```
//!
//! [`LedgerRecord`]: adlog_core::LedgerRecord

mod file;
mod memory;

pub use file::{FileLedger, FileLedgerConfig};
pub use memory::{MemoryLedger, MemoryLedgerConfig};

use adlog_core::{ContentAddress, EventType, LedgerError, RecordId, RejectReason, SignerId};

/// Derive the identifier for a record appended at `position`
pub(crate) fn assign_record_id(
    position: u64,
    signer: &SignerId,
    sequence: u64,
    event_type: EventType,
    address: &ContentAddress,
) -> RecordId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&position.to_be_bytes());
    hasher.update(signer.as_str().as_bytes());
    hasher.update(&sequence.to_be_bytes());
    hasher.update(&[event_type.as_u8()]);
    hasher.update(address.as_str().as_bytes());
    RecordId::assign(position, &hasher.finalize())
}

/// Validate a submission against the signer's expected sequence
pub(crate) fn check_submission(
    expected: u64,
    sequence: u64,
    address: &ContentAddress,
) -> Result<(), LedgerError> {
    if sequence != expected {
        return Err(LedgerError::Rejected(RejectReason::StaleSequence {
            expected,
            got: sequence,
        }));
    }
    if !address.is_well_formed() {
        return Err(LedgerError::Rejected(RejectReason::Invalid(format!(
            "malformed content address {address}"
        ))));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_ids_differ_per_submission() {
        let signer = SignerId::new("s");
        let address = ContentAddress::from_content(b"m");

        let a = assign_record_id(0, &signer, 0, EventType::Click, &address);
        let b = assign_record_id(1, &signer, 1, EventType::Click, &address);

        assert_ne!(a, b);
        assert!(a < b);
        assert_eq!(b.position(), Some(1));
    }

    #[test]
    fn test_check_submission() {
        let address = ContentAddress::from_content(b"m");
        assert!(check_submission(3, 3, &address).is_ok());

        let err = check_submission(3, 2, &address).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Rejected(RejectReason::StaleSequence { expected: 3, got: 2 })
        ));

        let err = check_submission(0, 0, &ContentAddress::new("nope")).unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(RejectReason::Invalid(_))));
    }
}
