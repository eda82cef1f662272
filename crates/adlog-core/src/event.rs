//! Event types
//!
//! [`EventMetadata`] lives in the content store, [`LedgerRecord`] lives in
//! the ledger, and [`CanonicalEvent`] is the merge of the two handed back to
//! callers (and projected into the cache).

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::UnknownEventType;
use crate::ids::{AccountId, ContentAddress, RecordId, SignerId};

/// Kind of ad event recorded on the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum EventType {
    Impression = 0,
    Click = 1,
    Conversion = 2,
}

impl EventType {
    /// Wire value stored on the ledger
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            EventType::Impression => "IMPRESSION",
            EventType::Click => "CLICK",
            EventType::Conversion => "CONVERSION",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for EventType {
    type Error = UnknownEventType;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EventType::Impression),
            1 => Ok(EventType::Click),
            2 => Ok(EventType::Conversion),
            other => Err(UnknownEventType(other.to_string())),
        }
    }
}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IMPRESSION" => Ok(EventType::Impression),
            "CLICK" => Ok(EventType::Click),
            "CONVERSION" => Ok(EventType::Conversion),
            _ => s
                .parse::<u8>()
                .map_err(|_| UnknownEventType(s.to_string()))
                .and_then(EventType::try_from),
        }
    }
}

/// Event attributes supplied by the client, before the owning account is known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSubmission {
    pub ip_address: String,
    pub device_info: String,
    pub location: String,
    /// Client-supplied event time; also the recency score
    pub timestamp: i64,
}

impl EventSubmission {
    /// Attach the authenticated owner to produce storable metadata
    pub fn into_metadata(self, account_id: AccountId) -> EventMetadata {
        EventMetadata {
            ip_address: self.ip_address,
            device_info: self.device_info,
            location: self.location,
            timestamp: self.timestamp,
            account_id,
        }
    }
}

/// Metadata blob stored in the content store
///
/// Field order is fixed, so encoding identical metadata always produces the
/// same bytes and therefore the same [`ContentAddress`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub ip_address: String,
    pub device_info: String,
    pub location: String,
    pub timestamp: i64,
    pub account_id: AccountId,
}

impl EventMetadata {
    /// Encode for the content store
    pub fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }

    /// Decode a blob fetched from the content store
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Address this metadata will be stored under
    pub fn content_address(&self) -> Result<ContentAddress, serde_json::Error> {
        Ok(ContentAddress::from_content(&self.to_bytes()?))
    }
}

/// Immutable ledger entry for one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub record_id: RecordId,
    pub event_type: EventType,
    pub address: ContentAddress,
    /// Identity that submitted the append
    pub signer: SignerId,
    /// Signer sequence number the append was accepted under
    pub sequence: u64,
    pub submitted_at_millis: i64,
    /// Set by privileged ledger logic only
    pub is_valid: bool,
}

/// Merged ledger + metadata view of an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEvent {
    pub record_id: RecordId,
    pub event_type: EventType,
    pub address: ContentAddress,
    pub signer: SignerId,
    pub sequence: u64,
    pub submitted_at_millis: i64,
    pub is_valid: bool,
    #[serde(flatten)]
    pub metadata: EventMetadata,
}

impl CanonicalEvent {
    /// Merge a ledger record with the metadata stored at its address
    pub fn merge(record: LedgerRecord, metadata: EventMetadata) -> Self {
        Self {
            record_id: record.record_id,
            event_type: record.event_type,
            address: record.address,
            signer: record.signer,
            sequence: record.sequence,
            submitted_at_millis: record.submitted_at_millis,
            is_valid: record.is_valid,
            metadata,
        }
    }

    /// Score used by the recent-events index
    pub fn timestamp(&self) -> i64 {
        self.metadata.timestamp
    }
}
