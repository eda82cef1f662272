//! # Adlog Core
//!
//! Core types, client traits, and errors for the adlog event ledger.
//!
//! An ad event is split across three backing systems: an append-only
//! [`Ledger`] (existence and integrity), a content-addressed
//! [`ContentStore`] (the metadata payload), and a [`Cache`] (a rebuildable
//! projection for fast reads). This crate defines the vocabulary shared by
//! the backends in `adlog-storage` and the coordinator in
//! `adlog-coordinator`.
//!
//! ## Key Types
//!
//! - [`EventMetadata`]: the client-supplied payload stored by content address
//! - [`ContentAddress`]: BLAKE3 address of a stored payload
//! - [`LedgerRecord`]: the immutable ledger entry for an event
//! - [`CanonicalEvent`]: the merged view returned to callers
//!
//! ## Key Traits
//!
//! - [`ContentStore`]: put/get blobs by content address
//! - [`Ledger`]: sequenced appends, finality, lookup and scans
//! - [`Cache`]: TTL key-value namespace plus a score-ordered index

pub mod error;
pub mod event;
pub mod ids;
pub mod traits;

pub use error::*;
pub use event::*;
pub use ids::*;
pub use traits::*;
