//! TTL Engine Module
//!
//! Everything that decides when a record expires and what happens then.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       TtlEngine                          │
//! │                                                          │
//! │  on_insert / on_update        on_found / on_got          │
//! │  (expires_at = now + ttl)     (active = false, lazy)     │
//! │            │                            │                │
//! │            ▼                            ▼                │
//! │      clock::compute_expiration   PendingCorrections      │
//! └──────────────────────────────────────────┬───────────────┘
//!                                            │ update
//!              ┌─────────────────────┐       ▼
//!              │   ExpirySweeper     │ ──> RecordStore
//!              │ (eager policy only) │ clear
//!              └─────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `clock`: moments, truncation and `now + ttl`
//! - `config`: field names, expiry policy, expiration encoding
//! - `engine`: the insert/update/read hooks
//! - `sweeper`: the background bulk delete
//! - `error`: [`TtlError`]

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod sweeper;

pub use clock::{compute_expiration, Clock, ManualClock, Moment, SystemClock};
pub use config::{never_expires, ExpirationFormat, ExpiryPolicy, TtlConfig};
pub use engine::{CorrectionReport, PendingCorrections, TtlEngine};
pub use error::{Result, TtlError};
pub use sweeper::{ExpirySweeper, SweepSnapshot, SweepStats, SweepTarget};
