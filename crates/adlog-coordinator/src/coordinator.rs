//! Event coordinator
//!
//! The only component that talks to all three backing systems. Writes go
//! content store, then ledger, then finality, then cache; reads go cache,
//! then ledger plus content store. Cache failures are logged and absorbed,
//! every other failure reaches the caller as a distinct [`ErrorKind`].
//!
//! [`ErrorKind`]: crate::ErrorKind

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use adlog_core::{
    AccountId, Cache, CanonicalEvent, ContentAddress, ContentStore, ContentStoreError,
    EventMetadata, EventSubmission, EventType, Ledger, LedgerError, LedgerRecord, RecordId,
    SignerId,
};

use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::projection::EventProjection;
use crate::sequencer::{SequenceLease, SequenceTracker};
use crate::stats::{CoordinatorStats, StatsCounters};

/// Records requested per ledger scan during an index rebuild
const REBUILD_SCAN_PAGE: usize = 256;

/// Outcome of a successful write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    /// Finality observed; the event is readable
    Finalized,
}

/// Returned by `create_event` and `resume_event`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventReceipt {
    pub record_id: RecordId,
    pub address: ContentAddress,
    pub status: EventStatus,
}

/// An append whose finality has not been observed yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingSubmission {
    pub record_id: RecordId,
    pub address: ContentAddress,
    pub event_type: EventType,
    pub signer: SignerId,
    pub sequence: u64,
    pub appended_at: DateTime<Utc>,
}

/// Summary of a recent-index rebuild
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    /// Finalized ledger records visited
    pub scanned: usize,
    /// Records re-projected into the cache
    pub indexed: usize,
    /// Records whose metadata or projection failed
    pub skipped: usize,
    /// Index members with no ledger record, removed
    pub pruned: usize,
}

/// How a single append attempt ended short of a record id
enum AppendError {
    /// The ledger answered, or the sequence fetch failed before sending
    Ledger(LedgerError),
    /// Sent but not answered within the limit; it may have landed
    Unanswered(Duration),
}

/// Run `fut` for at most `limit`, mapping expiry to `on_timeout()`
async fn bounded<T, E>(
    limit: Duration,
    fut: impl Future<Output = Result<T, E>>,
    on_timeout: impl FnOnce() -> E,
) -> Result<T, E> {
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or_else(|_| Err(on_timeout()))
}

/// Keeps a content store, a ledger, and a cache coherent per event
pub struct EventCoordinator {
    config: CoordinatorConfig,
    content: Arc<dyn ContentStore>,
    ledger: Arc<dyn Ledger>,
    projection: EventProjection,
    sequencer: SequenceTracker,
    pending: DashMap<RecordId, PendingSubmission>,
    stats: StatsCounters,
}

impl EventCoordinator {
    /// Create a coordinator over injected clients
    pub fn new(
        config: CoordinatorConfig,
        content: Arc<dyn ContentStore>,
        ledger: Arc<dyn Ledger>,
        cache: Arc<dyn Cache>,
    ) -> CoordinatorResult<Self> {
        config.validate()?;

        info!(
            signer = %config.signer,
            finality_timeout_ms = config.finality_timeout_ms,
            cache_ttl_secs = config.cache_ttl_secs,
            "Event coordinator initialized"
        );

        Ok(Self {
            projection: EventProjection::new(cache, config.cache_ttl()),
            config,
            content,
            ledger,
            sequencer: SequenceTracker::new(),
            pending: DashMap::new(),
            stats: StatsCounters::default(),
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// The cache projection this coordinator maintains
    pub fn projection(&self) -> &EventProjection {
        &self.projection
    }

    /// Record an event across all three backing systems
    ///
    /// On success the metadata is stored, the ledger append is final, and
    /// the cache has been populated on a best-effort basis. A
    /// [`CoordinatorError::LedgerFinalityTimeout`] means the append happened
    /// but was not confirmed; the submission stays pending and can be
    /// finished with [`resume_event`](Self::resume_event).
    #[instrument(
        skip(self, submission, account_id),
        fields(event_type = %event_type, signer = %self.config.signer)
    )]
    pub async fn create_event(
        &self,
        event_type: EventType,
        submission: EventSubmission,
        account_id: AccountId,
    ) -> CoordinatorResult<EventReceipt> {
        let metadata = submission.into_metadata(account_id);
        let payload = metadata
            .to_bytes()
            .map_err(|e| CoordinatorError::Internal(format!("metadata encoding failed: {e}")))?;

        let address = bounded(self.config.content_timeout(), self.content.put(payload), || {
            ContentStoreError::unavailable("content put timed out")
        })
        .await
        .map_err(CoordinatorError::from_content_put)?;
        debug!(address = %address.short(), "Stored event metadata");

        let (record_id, sequence) = self.append(event_type, &address).await?;
        self.pending.insert(
            record_id.clone(),
            PendingSubmission {
                record_id: record_id.clone(),
                address: address.clone(),
                event_type,
                signer: self.config.signer.clone(),
                sequence,
                appended_at: Utc::now(),
            },
        );
        info!(record_id = %record_id, sequence, "Appended event to ledger");

        self.confirm_finality(&record_id, &address).await?;
        self.pending.remove(&record_id);
        StatsCounters::incr(&self.stats.events_created);

        match self.read_record(&record_id).await {
            Ok(record) => {
                self.project(&CanonicalEvent::merge(record, metadata)).await;
            }
            Err(e) => {
                StatsCounters::incr(&self.stats.cache_write_failures);
                warn!(record_id = %record_id, error = %e, "Skipping cache population");
            }
        }

        Ok(EventReceipt {
            record_id,
            address,
            status: EventStatus::Finalized,
        })
    }

    /// Fetch an event, from the cache when possible
    #[instrument(skip(self), fields(record_id = %record_id))]
    pub async fn get_event(&self, record_id: &RecordId) -> CoordinatorResult<CanonicalEvent> {
        match self.projection.load(record_id).await {
            Ok(Some(event)) => {
                StatsCounters::incr(&self.stats.cache_hits);
                debug!("Cache hit");
                return Ok(event);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Cache read failed, reconstructing"),
        }
        StatsCounters::incr(&self.stats.cache_misses);

        let record = self.read_record(record_id).await?;
        let metadata = self.read_metadata(&record).await?;
        let event = CanonicalEvent::merge(record, metadata);
        self.project(&event).await;
        Ok(event)
    }

    /// Most recent events by timestamp, newest first
    ///
    /// Entries that fail to resolve are left out of the page and counted in
    /// [`CoordinatorStats::list_omissions`]. They stay in the index so later
    /// pages keep their offsets; [`rebuild_recent_index`](Self::rebuild_recent_index)
    /// prunes the ones the ledger does not know.
    #[instrument(skip(self))]
    pub async fn list_recent_events(
        &self,
        skip: usize,
        limit: usize,
    ) -> CoordinatorResult<Vec<CanonicalEvent>> {
        if limit == 0 || limit > self.config.max_list_limit {
            return Err(CoordinatorError::InvalidRequest(format!(
                "limit must be in 1..={}, got {limit}",
                self.config.max_list_limit
            )));
        }

        let ids = match self.projection.recent(skip, limit).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Recent index unavailable, returning empty page");
                return Ok(Vec::new());
            }
        };

        let resolved = join_all(ids.iter().map(|id| self.get_event(id))).await;

        let mut events = Vec::with_capacity(resolved.len());
        let mut omitted = 0;
        for (id, result) in ids.iter().zip(resolved) {
            match result {
                Ok(event) => events.push(event),
                Err(e) => {
                    omitted += 1;
                    warn!(record_id = %id, error = %e, "Omitting event from listing");
                }
            }
        }
        if omitted > 0 {
            StatsCounters::add(&self.stats.list_omissions, omitted);
        }

        Ok(events)
    }

    /// Finish a submission that previously timed out waiting for finality
    #[instrument(skip(self), fields(record_id = %record_id))]
    pub async fn resume_event(
        &self,
        record_id: &RecordId,
        address: &ContentAddress,
    ) -> CoordinatorResult<EventReceipt> {
        self.confirm_finality(record_id, address).await?;

        let record = self.read_record(record_id).await?;
        if &record.address != address {
            return Err(CoordinatorError::InvalidRequest(format!(
                "record {record_id} references {}, not {address}",
                record.address
            )));
        }
        if self.pending.remove(record_id).is_some() {
            StatsCounters::incr(&self.stats.events_created);
        }

        let metadata = self.read_metadata(&record).await?;
        self.project(&CanonicalEvent::merge(record, metadata)).await;

        info!("Resumed submission");
        Ok(EventReceipt {
            record_id: record_id.clone(),
            address: address.clone(),
            status: EventStatus::Finalized,
        })
    }

    /// Appended submissions still awaiting confirmed finality, oldest first
    pub fn pending_submissions(&self) -> Vec<PendingSubmission> {
        let mut pending: Vec<_> = self.pending.iter().map(|p| p.value().clone()).collect();
        pending.sort_by(|a, b| a.record_id.cmp(&b.record_id));
        pending
    }

    /// Re-project the latest `max_records` ledger records into the cache
    ///
    /// Restores listings after the cache has been wiped, then drops index
    /// members the ledger has no record of.
    #[instrument(skip(self))]
    pub async fn rebuild_recent_index(&self, max_records: usize) -> CoordinatorResult<RebuildReport> {
        let mut report = RebuildReport::default();
        if max_records == 0 {
            return Ok(report);
        }

        let mut latest: VecDeque<LedgerRecord> = VecDeque::new();
        let mut after: Option<RecordId> = None;
        loop {
            let page = bounded(
                self.config.read_timeout(),
                self.ledger.scan(after.as_ref(), REBUILD_SCAN_PAGE),
                || LedgerError::unavailable("ledger scan timed out"),
            )
            .await
            .map_err(CoordinatorError::from_ledger)?;

            let exhausted = page.len() < REBUILD_SCAN_PAGE;
            report.scanned += page.len();
            if let Some(last) = page.last() {
                after = Some(last.record_id.clone());
            }
            for record in page {
                if latest.len() == max_records {
                    latest.pop_front();
                }
                latest.push_back(record);
            }
            if exhausted {
                break;
            }
        }

        let outcomes = join_all(latest.into_iter().map(|record| async move {
            let record_id = record.record_id.clone();
            match self.read_metadata(&record).await {
                Ok(metadata) => self.project(&CanonicalEvent::merge(record, metadata)).await,
                Err(e) => {
                    warn!(record_id = %record_id, error = %e, "Skipping record during rebuild");
                    false
                }
            }
        }))
        .await;

        for projected in outcomes {
            if projected {
                report.indexed += 1;
            } else {
                report.skipped += 1;
            }
        }

        report.pruned = self.prune_recent_index().await;

        info!(
            scanned = report.scanned,
            indexed = report.indexed,
            skipped = report.skipped,
            pruned = report.pruned,
            "Rebuilt recent events index"
        );
        Ok(report)
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.stats.snapshot(self.pending.len())
    }

    /// Remove index members that resolve to no ledger record
    async fn prune_recent_index(&self) -> usize {
        let mut ghosts = Vec::new();
        let mut skip = 0;
        loop {
            let ids = match self.projection.recent(skip, REBUILD_SCAN_PAGE).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(error = %e, "Recent index unreadable, skipping prune");
                    return 0;
                }
            };
            let fetched = ids.len();
            for id in ids {
                if self.pending.contains_key(&id) {
                    continue;
                }
                if let Err(CoordinatorError::NotFound(_)) = self.read_record(&id).await {
                    ghosts.push(id);
                }
            }
            if fetched < REBUILD_SCAN_PAGE {
                break;
            }
            skip += fetched;
        }

        let mut pruned = 0;
        for id in ghosts {
            match self.projection.unindex(&id).await {
                Ok(removed) => pruned += usize::from(removed),
                Err(e) => debug!(record_id = %id, error = %e, "Failed to drop stale index entry"),
            }
        }
        pruned
    }

    /// Append under the signer's lease, retrying once after a rejection
    async fn append(
        &self,
        event_type: EventType,
        address: &ContentAddress,
    ) -> CoordinatorResult<(RecordId, u64)> {
        let mut lease = self.sequencer.lease(&self.config.signer).await;

        match self.try_append(&mut lease, event_type, address).await {
            Ok(appended) => return Ok(appended),
            Err(AppendError::Ledger(LedgerError::Rejected(reason))) => {
                StatsCounters::incr(&self.stats.ledger_retries);
                warn!(%reason, "Ledger rejected append, retrying with fresh sequence");
                lease.invalidate();
            }
            Err(e) => {
                lease.invalidate();
                return Err(self.append_failed(e, address));
            }
        }

        match self.try_append(&mut lease, event_type, address).await {
            Ok(appended) => Ok(appended),
            Err(e) => {
                lease.invalidate();
                Err(self.append_failed(e, address))
            }
        }
    }

    async fn try_append(
        &self,
        lease: &mut SequenceLease,
        event_type: EventType,
        address: &ContentAddress,
    ) -> Result<(RecordId, u64), AppendError> {
        let limit = self.config.append_timeout();
        let sequence = lease
            .next_sequence(self.ledger.as_ref(), limit)
            .await
            .map_err(AppendError::Ledger)?;

        let record_id = tokio::time::timeout(
            limit,
            self.ledger.append(lease.signer(), sequence, event_type, address),
        )
        .await
        .map_err(|_| AppendError::Unanswered(limit))?
        .map_err(AppendError::Ledger)?;

        lease.advance(sequence);
        Ok((record_id, sequence))
    }

    fn append_failed(&self, err: AppendError, address: &ContentAddress) -> CoordinatorError {
        match err {
            AppendError::Ledger(e) => CoordinatorError::from_ledger(e),
            AppendError::Unanswered(limit) => {
                StatsCounters::incr(&self.stats.append_timeouts);
                warn!(address = %address, ?limit, "Append unanswered, outcome unknown");
                CoordinatorError::LedgerAppendIndeterminate {
                    address: address.clone(),
                    reason: format!("no answer within {limit:?}"),
                }
            }
        }
    }

    /// Wait for finality; anything short of confirmation is indeterminate
    async fn confirm_finality(
        &self,
        record_id: &RecordId,
        address: &ContentAddress,
    ) -> CoordinatorResult<()> {
        let limit = self.config.finality_timeout();
        let outcome = tokio::time::timeout(limit, self.ledger.await_finality(record_id, limit)).await;

        let reason = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(LedgerError::NotFound(id))) => {
                self.pending.remove(&id);
                return Err(CoordinatorError::NotFound(id));
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("no finality within {limit:?}"),
        };

        StatsCounters::incr(&self.stats.finality_timeouts);
        warn!(record_id = %record_id, %reason, "Finality not confirmed, submission left pending");
        Err(CoordinatorError::LedgerFinalityTimeout {
            record_id: record_id.clone(),
            address: address.clone(),
        })
    }

    async fn read_record(&self, record_id: &RecordId) -> CoordinatorResult<LedgerRecord> {
        bounded(self.config.read_timeout(), self.ledger.get(record_id), || {
            LedgerError::unavailable("ledger read timed out")
        })
        .await
        .map_err(CoordinatorError::from_ledger)
    }

    async fn read_metadata(&self, record: &LedgerRecord) -> CoordinatorResult<EventMetadata> {
        let missing = |reason: String| {
            error!(
                record_id = %record.record_id,
                address = %record.address,
                %reason,
                "Ledger record has no retrievable metadata"
            );
            CoordinatorError::MetadataMissing {
                record_id: record.record_id.clone(),
                address: record.address.clone(),
                reason,
            }
        };

        let raw = bounded(self.config.read_timeout(), self.content.get(&record.address), || {
            ContentStoreError::unavailable("content read timed out")
        })
        .await
        .map_err(|e| match e {
            ContentStoreError::Unavailable(msg) => CoordinatorError::ContentStoreUnavailable(msg),
            other => missing(other.to_string()),
        })?;

        EventMetadata::from_bytes(&raw).map_err(|e| missing(format!("undecodable metadata: {e}")))
    }

    /// Best-effort projection write; returns whether it landed
    async fn project(&self, event: &CanonicalEvent) -> bool {
        match self.projection.store(event).await {
            Ok(()) => true,
            Err(e) => {
                StatsCounters::incr(&self.stats.cache_write_failures);
                warn!(record_id = %event.record_id, error = %e, "Cache projection failed");
                false
            }
        }
    }
}
