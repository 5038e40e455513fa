//! Record Store Module
//!
//! The engine never owns storage. Everything it persists goes through the
//! [`RecordStore`] trait, which a host framework implements over its own
//! backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐        update(record, original)
//! │  TtlEngine           │ ────────────────────────────────┐
//! │   on_found / on_got  │                                 │
//! └──────────────────────┘                                 ▼
//!                                                ┌──────────────────┐
//!                                                │   RecordStore    │
//! ┌──────────────────────┐        clear(query)   │  (host backend)  │
//! │  ExpirySweeper       │ ────────────────────> │                  │
//! └──────────────────────┘                       └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `query`: the `field <= bound` filter the sweeper sends to `clear`
//! - `memory`: a sharded in-memory implementation for tests and demos

pub mod memory;
pub mod query;

#[cfg(test)]
pub(crate) mod testing;

pub use memory::{MemoryStore, StoreStats};
pub use query::{Bound, Query, QueryError};

use crate::record::Record;
use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The record to update does not exist
    #[error("record not found: {0}")]
    NotFound(String),

    /// The backend refused the write because of a concurrent change
    #[error("conflicting update on record {0}")]
    Conflict(String),

    /// Any other backend failure
    #[error("store backend error: {0}")]
    Backend(String),
}

/// The storage collaborator used by the engine.
///
/// Implementations must be safe to share across the request-handling tasks
/// and the sweeper task; the engine performs no locking of its own.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Applies `record` over the stored version of `original`.
    async fn update(&self, record: &Record, original: &Record) -> Result<(), StoreError>;

    /// Deletes every record matching `query`, returning how many were removed.
    async fn clear(&self, query: &Query) -> Result<u64, StoreError>;
}
