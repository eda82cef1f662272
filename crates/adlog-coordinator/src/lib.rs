//! # Adlog Coordinator
//!
//! Orchestrates the three backing systems behind an ad event.
//!
//! The write path runs content put, ledger append, finality wait and cache
//! population strictly in that order, so a ledger record never becomes
//! visible without retrievable metadata. The read path treats the cache as
//! a disposable projection and falls back to the ledger and content store
//! on any miss.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use adlog_coordinator::{CoordinatorConfig, EventCoordinator};
//! use adlog_storage::{MemoryCache, MemoryContentStore, MemoryLedger};
//!
//! let coordinator = EventCoordinator::new(
//!     CoordinatorConfig::default(),
//!     Arc::new(MemoryContentStore::new()),
//!     Arc::new(MemoryLedger::new()),
//!     Arc::new(MemoryCache::new()),
//! )?;
//!
//! let receipt = coordinator
//!     .create_event(EventType::Click, submission, AccountId::new("acct-1"))
//!     .await?;
//! let event = coordinator.get_event(&receipt.record_id).await?;
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod projection;
pub mod sequencer;
pub mod stats;

pub use config::CoordinatorConfig;
pub use coordinator::{EventCoordinator, EventReceipt, EventStatus, PendingSubmission, RebuildReport};
pub use error::{CoordinatorError, CoordinatorResult, ErrorKind};
pub use projection::{EventProjection, RECENT_EVENTS_INDEX};
pub use sequencer::{SequenceLease, SequenceTracker};
pub use stats::CoordinatorStats;
