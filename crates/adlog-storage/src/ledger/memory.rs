//! In-memory ledger with simulated finality
//!
//! Records become final `finality_delay` after they are appended, or, while
//! finality is held, only once [`MemoryLedger::release_finality`] is called.
//! Non-final records are invisible to `get` and `scan`, like a transaction
//! that has been submitted but not yet mined.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use adlog_core::{
    ContentAddress, EventType, Ledger, LedgerError, LedgerRecord, RecordId, SignerId,
};

use super::{assign_record_id, check_submission};

/// Configuration for [`MemoryLedger`]
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerConfig {
    /// Delay between append and finality
    pub finality_delay: Duration,
}

struct Entry {
    record: LedgerRecord,
    /// `None` while finality is held
    final_at: Option<Instant>,
}

impl Entry {
    fn is_final(&self, now: Instant) -> bool {
        self.final_at.is_some_and(|at| at <= now)
    }
}

#[derive(Default)]
struct LedgerState {
    /// Records in submission order; the position is the vector index
    entries: Vec<Entry>,
    positions: HashMap<RecordId, usize>,
    next_sequence: HashMap<SignerId, u64>,
}

/// In-memory implementation of [`Ledger`]
pub struct MemoryLedger {
    config: MemoryLedgerConfig,
    state: RwLock<LedgerState>,
    /// Signalled whenever held records are released
    finality_changed: Notify,
    hold_finality: AtomicBool,
    available: AtomicBool,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// Ledger whose records are final immediately
    pub fn new() -> Self {
        Self::with_config(MemoryLedgerConfig::default())
    }

    pub fn with_config(config: MemoryLedgerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(LedgerState::default()),
            finality_changed: Notify::new(),
            hold_finality: AtomicBool::new(false),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the ledger endpoint going down or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Keep newly appended records pending until released
    pub fn hold_finality(&self, hold: bool) {
        self.hold_finality.store(hold, Ordering::SeqCst);
    }

    /// Finalize every held record now
    pub fn release_finality(&self) {
        let now = Instant::now();
        let released = {
            let mut state = self.state.write();
            let mut released = 0;
            for entry in state.entries.iter_mut().filter(|e| e.final_at.is_none()) {
                entry.final_at = Some(now);
                released += 1;
            }
            released
        };
        info!(released, "Released held ledger records");
        self.finality_changed.notify_waiters();
    }

    /// Privileged validity update, not reachable through the [`Ledger`] trait
    pub fn set_validity(&self, record_id: &RecordId, is_valid: bool) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        let position = *state
            .positions
            .get(record_id)
            .ok_or_else(|| LedgerError::NotFound(record_id.clone()))?;
        state.entries[position].record.is_valid = is_valid;
        Ok(())
    }

    /// Total appended records, final or not
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every appended record regardless of finality, in submission order
    pub fn records(&self) -> Vec<LedgerRecord> {
        self.state
            .read()
            .entries
            .iter()
            .map(|e| e.record.clone())
            .collect()
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LedgerError::unavailable("memory ledger offline"))
        }
    }

    /// Finality deadline of a record; outer `None` if unknown
    fn final_at(&self, record_id: &RecordId) -> Option<Option<Instant>> {
        let state = self.state.read();
        let position = *state.positions.get(record_id)?;
        Some(state.entries[position].final_at)
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn next_sequence(&self, signer: &SignerId) -> Result<u64, LedgerError> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .next_sequence
            .get(signer)
            .copied()
            .unwrap_or(0))
    }

    #[instrument(skip(self, address), fields(address = %address.short()))]
    async fn append(
        &self,
        signer: &SignerId,
        sequence: u64,
        event_type: EventType,
        address: &ContentAddress,
    ) -> Result<RecordId, LedgerError> {
        self.check_available()?;

        let final_at = if self.hold_finality.load(Ordering::SeqCst) {
            None
        } else {
            Some(Instant::now() + self.config.finality_delay)
        };

        let mut state = self.state.write();
        let expected = state.next_sequence.get(signer).copied().unwrap_or(0);
        check_submission(expected, sequence, address)?;

        let position = state.entries.len();
        let record_id = assign_record_id(position as u64, signer, sequence, event_type, address);
        let record = LedgerRecord {
            record_id: record_id.clone(),
            event_type,
            address: address.clone(),
            signer: signer.clone(),
            sequence,
            submitted_at_millis: chrono::Utc::now().timestamp_millis(),
            is_valid: true,
        };

        state.entries.push(Entry { record, final_at });
        state.positions.insert(record_id.clone(), position);
        state.next_sequence.insert(signer.clone(), sequence + 1);

        debug!(record_id = %record_id, "Appended record");
        Ok(record_id)
    }

    async fn await_finality(
        &self,
        record_id: &RecordId,
        timeout: Duration,
    ) -> Result<(), LedgerError> {
        self.check_available()?;
        let deadline = Instant::now() + timeout;

        loop {
            // Register before inspecting state so a release in between is not lost.
            let released = self.finality_changed.notified();

            let final_at = self
                .final_at(record_id)
                .ok_or_else(|| LedgerError::NotFound(record_id.clone()))?;

            let now = Instant::now();
            let wake = match final_at {
                Some(at) if at <= now => return Ok(()),
                Some(at) => at.min(deadline),
                None => deadline,
            };
            if now >= deadline {
                return Err(LedgerError::FinalityTimeout(record_id.clone()));
            }

            tokio::select! {
                _ = released => {}
                _ = tokio::time::sleep_until(wake) => {}
            }
        }
    }

    async fn get(&self, record_id: &RecordId) -> Result<LedgerRecord, LedgerError> {
        self.check_available()?;

        let now = Instant::now();
        let state = self.state.read();
        state
            .positions
            .get(record_id)
            .map(|&position| &state.entries[position])
            .filter(|entry| entry.is_final(now))
            .map(|entry| entry.record.clone())
            .ok_or_else(|| LedgerError::NotFound(record_id.clone()))
    }

    async fn scan(
        &self,
        after: Option<&RecordId>,
        limit: usize,
    ) -> Result<Vec<LedgerRecord>, LedgerError> {
        self.check_available()?;

        let now = Instant::now();
        let state = self.state.read();
        let start = match after {
            Some(id) => {
                state
                    .positions
                    .get(id)
                    .copied()
                    .ok_or_else(|| LedgerError::NotFound(id.clone()))?
                    + 1
            }
            None => 0,
        };

        Ok(state.entries[start.min(state.entries.len())..]
            .iter()
            .filter(|entry| entry.is_final(now))
            .take(limit)
            .map(|entry| entry.record.clone())
            .collect())
    }
}
