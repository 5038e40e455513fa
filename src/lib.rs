//! # ttlkeeper - Time-To-Live Expiration for Stored Records
//!
//! ttlkeeper turns a per-record TTL (in seconds) into an absolute expiration
//! moment, marks records inactive once that moment has passed, and can purge
//! expired records in the background. It owns no storage: persistence goes
//! through the [`RecordStore`] trait.
//!
//! ## Features
//!
//! - **Expiration Arithmetic**: `expires_at = now + ttl`, truncated to microseconds
//! - **Lifecycle Hooks**: insert and update hooks that set or refresh `expires_at`
//! - **Lazy Deactivation**: reads flip `active` to false and persist it off the read path
//! - **Active Sweeping**: a background Tokio task bulk-deletes expired records
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              ttlkeeper                                  │
//! │                                                                         │
//! │  ┌─────────────┐    ┌──────────────────────────┐    ┌──────────────┐    │
//! │  │ Host        │───>│        TtlEngine          │───>│ RecordStore  │    │
//! │  │ pipeline    │    │ on_insert   on_update     │    │  (trait)     │    │
//! │  │             │    │ on_found    on_got        │    │              │    │
//! │  └─────────────┘    └──────────────────────────┘    └──────▲───────┘    │
//! │                                                            │            │
//! │                     ┌──────────────────────────────────────┴─────────┐  │
//! │                     │           ExpirySweeper                        │  │
//! │                     │      (Background Tokio Task)                   │  │
//! │                     └────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use ttlkeeper::{MemoryStore, Record, TtlConfig, TtlEngine};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(MemoryStore::new());
//!
//!     // Sweep expired records every 5 seconds
//!     let config = TtlConfig::default().with_sweep_interval(Duration::from_secs(5));
//!     let engine = TtlEngine::new(config, store.clone()).unwrap();
//!
//!     let mut batch = vec![Record::new("session:1").with("ttl", 10)];
//!     engine.on_insert(&mut batch).unwrap();
//!     for record in batch {
//!         store.insert(record);
//!     }
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`record`]: loosely typed records with fallible typed accessors
//! - [`ttl`]: the engine, its configuration, clock and sweeper
//! - [`store`]: the store trait, expiration filters and an in-memory store
//!
//! ## Expiry Policies
//!
//! Expired records are handled in exactly one of two ways:
//! 1. **Lazy**: when a record is read, it is marked inactive
//! 2. **Eager**: a background task periodically deletes expired records
//!
//! Lazy keeps expired records around (inactive) for auditing. Eager reclaims
//! them even if they are never read again.

pub mod record;
pub mod store;
pub mod ttl;

// Re-export commonly used types for convenience
pub use record::{FieldValue, Record};
pub use store::{MemoryStore, Query, RecordStore, StoreError};
pub use ttl::{
    ExpirationFormat, ExpiryPolicy, ExpirySweeper, PendingCorrections, TtlConfig, TtlEngine,
    TtlError,
};

/// Version of ttlkeeper
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
