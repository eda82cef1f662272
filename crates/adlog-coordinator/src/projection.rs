//! Cache projection of canonical events
//!
//! Events are stored under `event:{record_id}` as JSON with a TTL, and
//! their record ids are kept in the [`RECENT_EVENTS_INDEX`] scored by the
//! metadata timestamp. Everything here can be dropped and rebuilt from the
//! ledger and content store.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::trace;

use adlog_core::{Cache, CacheError, CanonicalEvent, RecordId};

/// Index of recently created or read events, newest timestamp first
pub const RECENT_EVENTS_INDEX: &str = "recent_events";

const EVENT_KEY_PREFIX: &str = "event:";

/// Maps canonical events onto a [`Cache`]
#[derive(Clone)]
pub struct EventProjection {
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl EventProjection {
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Cache key for an event
    pub fn event_key(record_id: &RecordId) -> String {
        format!("{EVENT_KEY_PREFIX}{record_id}")
    }

    /// Load a cached event
    ///
    /// An entry that no longer decodes is reported as a serialization error
    /// so the caller can fall back to reconstruction.
    pub async fn load(&self, record_id: &RecordId) -> Result<Option<CanonicalEvent>, CacheError> {
        let Some(raw) = self.cache.get(&Self::event_key(record_id)).await? else {
            return Ok(None);
        };
        let event: CanonicalEvent = serde_json::from_slice(&raw)?;
        if &event.record_id != record_id {
            return Err(CacheError::Serialization(format!(
                "entry for {record_id} holds {}",
                event.record_id
            )));
        }
        Ok(Some(event))
    }

    /// Write the event entry and its recency index member
    pub async fn store(&self, event: &CanonicalEvent) -> Result<(), CacheError> {
        let raw = Bytes::from(serde_json::to_vec(event)?);
        self.cache
            .set(&Self::event_key(&event.record_id), raw, self.ttl)
            .await?;
        self.cache
            .index_add(RECENT_EVENTS_INDEX, event.record_id.as_str(), event.timestamp())
            .await?;
        trace!(record_id = %event.record_id, "Projected event");
        Ok(())
    }

    /// Drop the cached entry, leaving the index untouched
    pub async fn evict(&self, record_id: &RecordId) -> Result<bool, CacheError> {
        self.cache.expire(&Self::event_key(record_id)).await
    }

    /// Drop a record id from the recency index
    pub async fn unindex(&self, record_id: &RecordId) -> Result<bool, CacheError> {
        self.cache
            .index_remove(RECENT_EVENTS_INDEX, record_id.as_str())
            .await
    }

    /// Record ids from the index, newest first, after skipping `skip`
    pub async fn recent(&self, skip: usize, limit: usize) -> Result<Vec<RecordId>, CacheError> {
        Ok(self
            .cache
            .index_range(RECENT_EVENTS_INDEX, skip, limit)
            .await?
            .into_iter()
            .map(RecordId::new)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adlog_core::{AccountId, EventSubmission, EventType, LedgerRecord, SignerId};
    use adlog_storage::MemoryCache;

    fn event(position: u64, timestamp: i64) -> CanonicalEvent {
        let metadata = EventSubmission {
            ip_address: "10.0.0.1".into(),
            device_info: "android".into(),
            location: "DE".into(),
            timestamp,
        }
        .into_metadata(AccountId::new("acct"));
        let address = metadata.content_address().unwrap();
        let record = LedgerRecord {
            record_id: RecordId::new(format!("{position:016x}-{:016x}", position * 31)),
            event_type: EventType::Impression,
            address,
            signer: SignerId::new("s"),
            sequence: position,
            submitted_at_millis: 1_700_000_000_000,
            is_valid: true,
        };
        CanonicalEvent::merge(record, metadata)
    }

    fn projection(cache: Arc<MemoryCache>) -> EventProjection {
        EventProjection::new(cache, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_store_and_load() {
        let cache = Arc::new(MemoryCache::new());
        let projection = projection(cache.clone());
        let event = event(0, 1000);

        projection.store(&event).await.unwrap();
        assert_eq!(projection.load(&event.record_id).await.unwrap(), Some(event.clone()));
        assert_eq!(cache.index_len(RECENT_EVENTS_INDEX), 1);

        assert!(projection.evict(&event.record_id).await.unwrap());
        assert_eq!(projection.load(&event.record_id).await.unwrap(), None);
        assert_eq!(cache.index_len(RECENT_EVENTS_INDEX), 1);
    }

    #[tokio::test]
    async fn test_undecodable_entry() {
        let cache = Arc::new(MemoryCache::new());
        let projection = projection(cache.clone());
        let id = RecordId::new("0000000000000000-0000000000000000");

        cache
            .set(&EventProjection::event_key(&id), Bytes::from_static(b"not json"), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(matches!(
            projection.load(&id).await,
            Err(CacheError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_recent_orders_by_timestamp() {
        let cache = Arc::new(MemoryCache::new());
        let projection = projection(cache);
        let old = event(0, 100);
        let new = event(1, 300);
        let mid = event(2, 200);

        for e in [&old, &new, &mid] {
            projection.store(e).await.unwrap();
        }

        let ids = projection.recent(0, 10).await.unwrap();
        assert_eq!(ids, vec![new.record_id.clone(), mid.record_id.clone(), old.record_id.clone()]);
        assert_eq!(projection.recent(1, 1).await.unwrap(), vec![mid.record_id.clone()]);

        assert!(projection.unindex(&mid.record_id).await.unwrap());
        assert_eq!(projection.recent(0, 10).await.unwrap().len(), 2);
    }

    #[test]
    fn test_event_key() {
        let id = RecordId::new("00000000000000ff-0123456789abcdef");
        assert_eq!(
            EventProjection::event_key(&id),
            "event:00000000000000ff-0123456789abcdef"
        );
    }
}
