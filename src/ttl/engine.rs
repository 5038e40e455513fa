//! TTL Expiration Engine
//!
//! [`TtlEngine`] is a set of hooks a host pipeline calls around record
//! operations:
//!
//! ```text
//!   insert ──> on_insert ──> store persists     (expires_at = now + ttl)
//!   update ──> on_update ──> store persists     (expires_at refreshed)
//!   list   ──> store reads ──> on_found         (active = false if expired)
//!   get    ──> store reads ──> on_got           (active = false if expired)
//! ```
//!
//! The write hooks mutate records in place and fail synchronously. The read
//! hooks never fail: they correct `active` in the returned data and dispatch
//! the matching store update on a separate task.
//!
//! Under [`ExpiryPolicy::Eager`] the engine owns an [`ExpirySweeper`] and the
//! read hooks do nothing.

use crate::record::{FieldValue, Record};
use crate::store::{RecordStore, StoreError};
use crate::ttl::clock::{compute_expiration, Clock, Moment, SystemClock};
use crate::ttl::config::{ExpiryPolicy, TtlConfig};
use crate::ttl::error::{Result, TtlError};
use crate::ttl::sweeper::{ExpirySweeper, SweepTarget};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// The TTL expiration engine.
///
/// # Example
///
/// ```
/// use ttlkeeper::{MemoryStore, Record, TtlConfig, TtlEngine};
/// use std::sync::Arc;
///
/// let store = Arc::new(MemoryStore::new());
/// let engine = TtlEngine::new(TtlConfig::default(), store).unwrap();
///
/// let mut batch = vec![Record::new("session:1").with("ttl", 60)];
/// engine.on_insert(&mut batch).unwrap();
/// assert!(batch[0].contains("expires_at"));
/// ```
pub struct TtlEngine {
    config: TtlConfig,
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    /// Present only under the eager policy; dropping the engine stops it
    sweeper: Option<ExpirySweeper>,
}

impl std::fmt::Debug for TtlEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlEngine")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("sweeper", &self.sweeper)
            .finish()
    }
}

impl TtlEngine {
    /// Creates an engine using the system clock.
    ///
    /// Under the eager policy this starts the background sweeper, which
    /// requires a running Tokio runtime.
    pub fn new(config: TtlConfig, store: Arc<dyn RecordStore>) -> Result<Self> {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    /// Creates an engine with an explicit clock.
    pub fn with_clock(
        config: TtlConfig,
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let sweeper = match config.policy {
            ExpiryPolicy::Lazy => None,
            ExpiryPolicy::Eager { interval } => Some(ExpirySweeper::start(
                Arc::clone(&store),
                Arc::clone(&clock),
                SweepTarget {
                    field: config.expires_at_field.clone(),
                    format: config.format,
                },
                interval,
            )?),
        };

        debug!(policy = ?config.policy, format = ?config.format, "TTL engine created");

        Ok(Self {
            config,
            store,
            clock,
            sweeper,
        })
    }

    /// The engine configuration.
    pub fn config(&self) -> &TtlConfig {
        &self.config
    }

    /// The background sweeper, if the eager policy is active.
    pub fn sweeper(&self) -> Option<&ExpirySweeper> {
        self.sweeper.as_ref()
    }

    /// Stops the background sweeper, if any. Dropping the engine does the same.
    pub fn shutdown(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.stop();
        }
    }

    fn now(&self) -> Moment {
        self.config.format.truncate(self.clock.now())
    }

    /// Reads the TTL of a record.
    ///
    /// Absent, null and non-integer values all count as "not found". Unsigned
    /// values too large for `i64` are reported as [`TtlError::OutOfRange`].
    fn read_ttl(&self, record: &Record) -> Result<i64> {
        let field = &self.config.ttl_field;
        match record.integer(field) {
            Ok(Some(ttl)) => Ok(ttl),
            Ok(None) => Err(TtlError::MissingField {
                field: field.clone(),
                found: "nothing",
            }),
            Err(TtlError::FieldType { found, .. }) => Err(TtlError::MissingField {
                field: field.clone(),
                found,
            }),
            Err(e) => Err(e),
        }
    }

    /// Computes the encoded `expires_at` value for a positive TTL.
    fn expiration_for(&self, ttl: i64, now: Moment) -> Result<FieldValue> {
        let expires = compute_expiration(ttl, now)?;
        Ok(self.config.format.encode(expires))
    }

    /// Insert hook: sets `expires_at = now + ttl` on each record with a positive TTL.
    ///
    /// The batch is all-or-nothing. Every TTL is read (and every expiration
    /// computed) before any record is touched, so on error no record has been
    /// mutated.
    pub fn on_insert(&self, records: &mut [Record]) -> Result<()> {
        let now = self.now();

        let expirations = records
            .iter()
            .map(|record| {
                let ttl = self.read_ttl(record)?;
                if ttl > 0 {
                    self.expiration_for(ttl, now).map(Some)
                } else {
                    Ok(None)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let field = &self.config.expires_at_field;
        for (record, expires) in records.iter_mut().zip(expirations) {
            if let Some(expires) = expires {
                trace!(id = record.id(), expires_at = %expires, "Expiration set");
                record.set(field.as_str(), expires);
            }
        }

        Ok(())
    }

    /// Update hook: refreshes `expires_at` on the incoming record.
    ///
    /// - An inactive record is frozen: nothing is recomputed.
    /// - The effective TTL is the incoming one when readable, otherwise the
    ///   original one.
    /// - Only a positive effective TTL refreshes the expiration. An incoming
    ///   TTL of zero or less is the effective TTL and therefore suppresses the
    ///   refresh, even if the original TTL was positive.
    pub fn on_update(&self, record: &mut Record, original: &Record) -> Result<()> {
        if record.boolean(&self.config.active_field)? == Some(false) {
            trace!(id = record.id(), "Inactive record, expiration left as is");
            return Ok(());
        }

        let ttl = match self.read_ttl(record) {
            Ok(ttl) => ttl,
            Err(TtlError::MissingField { found, .. }) => match self.read_ttl(original) {
                Ok(ttl) => ttl,
                Err(TtlError::MissingField { .. }) => {
                    return Err(TtlError::MissingField {
                        field: self.config.ttl_field.clone(),
                        found,
                    })
                }
                Err(e) => return Err(e),
            },
            Err(e) => return Err(e),
        };

        if ttl > 0 {
            let expires = self.expiration_for(ttl, self.now())?;
            trace!(id = record.id(), expires_at = %expires, "Expiration refreshed");
            record.set(self.config.expires_at_field.as_str(), expires);
        }

        Ok(())
    }

    /// Read hook for list results.
    ///
    /// Every expired, still-active record gets `active = false` in `records`
    /// before this returns, and one store update per such record is dispatched
    /// without being awaited.
    pub fn on_found(&self, records: &mut [Record]) -> PendingCorrections {
        let mut pending = PendingCorrections::default();
        if !self.config.policy.is_lazy() {
            return pending;
        }

        let now = self.now();
        for record in records.iter_mut() {
            self.deactivate_if_expired(record, now, &mut pending);
        }

        if !pending.is_empty() {
            debug!(deactivated = pending.len(), "Expired records deactivated on read");
        }
        pending
    }

    /// Read hook for a single record. Same behavior as [`on_found`](Self::on_found).
    pub fn on_got(&self, record: &mut Record) -> PendingCorrections {
        self.on_found(std::slice::from_mut(record))
    }

    fn deactivate_if_expired(
        &self,
        record: &mut Record,
        now: Moment,
        pending: &mut PendingCorrections,
    ) {
        match self.is_expired(record, now) {
            Ok(false) => {}
            Ok(true) => {
                record.set(self.config.active_field.as_str(), false);
                pending.dispatch(Arc::clone(&self.store), record.clone());
            }
            Err(e) => {
                warn!(id = record.id(), error = %e, "Skipping expiry check on malformed record");
            }
        }
    }

    /// True when the record is active and its expiration is at or before `now`.
    ///
    /// Records that are already inactive, or that carry no expiration, are
    /// never reported as expired.
    fn is_expired(&self, record: &Record, now: Moment) -> Result<bool> {
        if record.boolean(&self.config.active_field)? == Some(false) {
            return Ok(false);
        }
        Ok(record
            .moment(&self.config.expires_at_field)?
            .is_some_and(|expires| expires <= now))
    }
}

/// Outcome of a batch of read-path corrections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CorrectionReport {
    /// Updates the store accepted
    pub applied: usize,
    /// Updates that failed or could not be dispatched
    pub failed: usize,
}

/// Store updates dispatched by a read hook.
///
/// The read has already returned its (corrected) data; these writes run on
/// their own tasks. Dropping the handle detaches them, they still complete.
/// Awaiting [`settle`](Self::settle) reports how they went.
#[derive(Debug, Default)]
pub struct PendingCorrections {
    ids: Vec<String>,
    handles: Vec<Option<JoinHandle<std::result::Result<(), StoreError>>>>,
}

impl PendingCorrections {
    fn dispatch(&mut self, store: Arc<dyn RecordStore>, record: Record) {
        let id = record.id().to_string();

        let handle = match Handle::try_current() {
            Ok(runtime) => Some(runtime.spawn(async move {
                let result = store.update(&record, &record).await;
                if let Err(e) = &result {
                    warn!(id = record.id(), error = %e, "Failed to persist deactivation");
                }
                result
            })),
            Err(_) => {
                warn!(id = %id, "No Tokio runtime, deactivation not persisted");
                None
            }
        };

        self.ids.push(id);
        self.handles.push(handle);
    }

    /// Number of dispatched corrections.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if nothing was dispatched.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids of the records being corrected, in read order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Waits for every correction and counts the outcomes.
    pub async fn settle(self) -> CorrectionReport {
        let mut report = CorrectionReport::default();
        for handle in self.handles {
            match handle {
                Some(handle) => match handle.await {
                    Ok(Ok(())) => report.applied += 1,
                    _ => report.failed += 1,
                },
                None => report.failed += 1,
            }
        }
        report
    }
}
