//! Request correlation for coordinator calls
//!
//! A [`CorrelationContext`] is created per inbound call and entered as a
//! span, so every log line emitted by the coordinator and the backends on
//! behalf of that call carries the same `request_id`.

use serde::{Deserialize, Serialize};
use tracing::Span;
use uuid::Uuid;

/// Correlation context for one inbound call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationContext {
    /// Shared by every span created for the same call
    pub request_id: Uuid,

    /// Unique to this operation
    pub span_id: Uuid,

    /// Links a sub-operation to the operation that started it
    pub parent_span_id: Option<Uuid>,

    /// Operation name, one of [`spans`]
    pub operation: Option<String>,

    /// Ledger record the call concerns, once known
    pub record_id: Option<String>,
}

impl CorrelationContext {
    /// Create a root context for a new inbound call
    pub fn new_request() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
            parent_span_id: None,
            operation: None,
            record_id: None,
        }
    }

    /// Create a child context sharing the request id
    pub fn child(&self) -> Self {
        Self {
            request_id: self.request_id,
            span_id: Uuid::new_v4(),
            parent_span_id: Some(self.span_id),
            operation: self.operation.clone(),
            record_id: self.record_id.clone(),
        }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_record_id(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    /// Build an `info`-level span carrying the correlation fields
    pub fn span(&self) -> Span {
        let parent_span_id = self.parent_span_id.map(|id| id.to_string());
        tracing::info_span!(
            "request",
            request_id = %self.request_id,
            span_id = %self.span_id,
            parent_span_id = parent_span_id.as_deref(),
            operation = self.operation.as_deref(),
            record_id = self.record_id.as_deref(),
        )
    }
}

impl Default for CorrelationContext {
    fn default() -> Self {
        Self::new_request()
    }
}

/// Standard field names used in adlog log lines
pub mod fields {
    pub const REQUEST_ID: &str = "request_id";
    pub const SPAN_ID: &str = "span_id";
    pub const OPERATION: &str = "operation";
    pub const RECORD_ID: &str = "record_id";
}

/// Standard operation names
pub mod spans {
    pub const CREATE_EVENT: &str = "create_event";
    pub const GET_EVENT: &str = "get_event";
    pub const LIST_RECENT_EVENTS: &str = "list_recent_events";
    pub const RESUME_EVENT: &str = "resume_event";
    pub const REBUILD_INDEX: &str = "rebuild_recent_index";
}
