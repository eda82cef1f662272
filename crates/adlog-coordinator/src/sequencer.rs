//! Per-signer sequence serialization
//!
//! A ledger accepts an append only under the signer's next sequence number,
//! so two appends racing on the same number would see one rejected. The
//! tracker hands out one [`SequenceLease`] per signer at a time; the lease
//! caches the next number between appends and is refreshed from the ledger
//! whenever that cache is invalidated.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use adlog_core::{Ledger, LedgerError, SignerId};

/// Hands out exclusive sequence leases per signer
#[derive(Debug, Default)]
pub struct SequenceTracker {
    slots: DashMap<SignerId, Arc<Mutex<Option<u64>>>>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `signer`'s sequence counter
    pub async fn lease(&self, signer: &SignerId) -> SequenceLease {
        let slot = self.slots.entry(signer.clone()).or_default().clone();
        SequenceLease {
            signer: signer.clone(),
            next: slot.lock_owned().await,
        }
    }

    /// Cached next sequence for `signer`, if known and not leased
    pub fn cached(&self, signer: &SignerId) -> Option<u64> {
        let slot = self.slots.get(signer)?.clone();
        slot.try_lock().ok().and_then(|next| *next)
    }
}

/// Exclusive hold on one signer's sequence counter
///
/// Dropping the lease releases the signer. A lease dropped mid-append keeps
/// whatever was cached; a stale value is corrected by the next rejection.
#[derive(Debug)]
pub struct SequenceLease {
    signer: SignerId,
    next: OwnedMutexGuard<Option<u64>>,
}

impl SequenceLease {
    pub fn signer(&self) -> &SignerId {
        &self.signer
    }

    /// Next sequence to submit, fetched from the ledger if not cached
    pub async fn next_sequence(
        &mut self,
        ledger: &dyn Ledger,
        limit: Duration,
    ) -> Result<u64, LedgerError> {
        if let Some(next) = *self.next {
            return Ok(next);
        }

        let fetched = tokio::time::timeout(limit, ledger.next_sequence(&self.signer))
            .await
            .map_err(|_| LedgerError::unavailable("sequence fetch timed out"))??;
        debug!(signer = %self.signer, sequence = fetched, "Fetched sequence from ledger");
        *self.next = Some(fetched);
        Ok(fetched)
    }

    /// Record that `used` was accepted by the ledger
    pub fn advance(&mut self, used: u64) {
        *self.next = Some(used + 1);
    }

    /// Forget the cached value so the next call asks the ledger
    pub fn invalidate(&mut self) {
        *self.next = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adlog_core::{ContentAddress, EventType};
    use adlog_storage::MemoryLedger;

    #[tokio::test]
    async fn test_fetch_then_cache() {
        let ledger = MemoryLedger::new();
        let tracker = SequenceTracker::new();
        let signer = SignerId::new("a");
        let limit = Duration::from_secs(1);

        let mut lease = tracker.lease(&signer).await;
        assert_eq!(lease.next_sequence(&ledger, limit).await.unwrap(), 0);
        ledger
            .append(&signer, 0, EventType::Click, &ContentAddress::from_content(b"x"))
            .await
            .unwrap();
        lease.advance(0);
        drop(lease);

        assert_eq!(tracker.cached(&signer), Some(1));
    }

    #[tokio::test]
    async fn test_invalidate_refetches() {
        let ledger = MemoryLedger::new();
        let tracker = SequenceTracker::new();
        let signer = SignerId::new("a");
        let limit = Duration::from_secs(1);

        let mut lease = tracker.lease(&signer).await;
        lease.advance(41);
        assert_eq!(lease.next_sequence(&ledger, limit).await.unwrap(), 42);

        lease.invalidate();
        assert_eq!(lease.next_sequence(&ledger, limit).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_is_exclusive_per_signer() {
        let tracker = Arc::new(SequenceTracker::new());
        let a = SignerId::new("a");
        let b = SignerId::new("b");

        let held = tracker.lease(&a).await;
        assert_eq!(tracker.cached(&a), None);

        // Another signer is not blocked.
        let _other = tracker.lease(&b).await;

        let waiter = {
            let tracker = tracker.clone();
            let a = a.clone();
            tokio::spawn(async move {
                let mut lease = tracker.lease(&a).await;
                lease.advance(7);
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap();
        assert_eq!(tracker.cached(&a), Some(8));
    }
}
