//! Background Expiry Sweeper
//!
//! Under [`ExpiryPolicy::Eager`](crate::ttl::ExpiryPolicy::Eager) expired
//! records are not deactivated on read; they are deleted in bulk by a
//! background task instead.
//!
//! ## Design
//!
//! The sweeper runs as a Tokio task and, every `interval`:
//! 1. Reads "now" from the engine's clock
//! 2. Builds the filter `{expires_at: {$lte: now}}` and compiles it
//! 3. Asks the store to clear every matching record in one call
//! 4. Logs the outcome
//!
//! A failed tick is not retried. The next tick builds a fresh filter against
//! a later "now", so anything missed is picked up then.
//!
//! ## Lifecycle
//!
//! The task lives exactly as long as its [`ExpirySweeper`] handle. Dropping
//! the handle (or calling [`ExpirySweeper::stop`]) signals the task through a
//! `watch` channel and it exits at its next wake-up.

use crate::store::{Query, QueryError, RecordStore, StoreError};
use crate::ttl::clock::Clock;
use crate::ttl::config::ExpirationFormat;
use crate::ttl::error::{Result, TtlError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Counters updated by the sweeper task.
#[derive(Debug, Default)]
pub struct SweepStats {
    /// Ticks that ran (successful or not)
    pub ticks: AtomicU64,
    /// Records removed across all ticks
    pub cleared: AtomicU64,
    /// Ticks whose filter could not be compiled or whose clear failed
    pub failures: AtomicU64,
}

/// A point-in-time copy of [`SweepStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepSnapshot {
    pub ticks: u64,
    pub cleared: u64,
    pub failures: u64,
}

impl SweepStats {
    /// Reads all counters.
    pub fn snapshot(&self) -> SweepSnapshot {
        SweepSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            cleared: self.cleared.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// What a sweep deletes: records whose `field` is at or before "now".
#[derive(Debug, Clone)]
pub struct SweepTarget {
    /// The expiration field name
    pub field: String,
    /// How "now" is serialized into the filter
    pub format: ExpirationFormat,
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,

    /// Shared counters
    stats: Arc<SweepStats>,

    /// Time between ticks
    interval: Duration,
}

impl ExpirySweeper {
    /// Starts the sweeper as a background task on the current Tokio runtime.
    ///
    /// The first tick fires one `interval` after start.
    ///
    /// # Errors
    ///
    /// [`TtlError::InvalidConfig`] for a zero interval or one too large to
    /// schedule, [`TtlError::NoRuntime`] when called outside a Tokio runtime.
    pub fn start(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        target: SweepTarget,
        interval: Duration,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(TtlError::InvalidConfig(
                "sweep interval must be positive".to_string(),
            ));
        }
        let runtime = Handle::try_current().map_err(|_| TtlError::NoRuntime)?;
        let first_tick = Instant::now().checked_add(interval).ok_or_else(|| {
            TtlError::InvalidConfig(format!("sweep interval {:?} is too large", interval))
        })?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(SweepStats::default());

        let mut ticker = tokio::time::interval_at(first_tick, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        runtime.spawn(sweeper_loop(
            store,
            clock,
            target.clone(),
            ticker,
            Arc::clone(&stats),
            shutdown_rx,
        ));

        info!(
            field = %target.field,
            interval_ms = interval.as_millis(),
            "Background expiry sweeper started"
        );

        Ok(Self {
            shutdown_tx,
            stats,
            interval,
        })
    }

    /// Stops the sweeper.
    ///
    /// This is called automatically when the handle is dropped. Calling it
    /// more than once is harmless.
    pub fn stop(&self) {
        if !self.shutdown_tx.send_replace(true) {
            info!("Background expiry sweeper stopped");
        }
    }

    /// Returns true once [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Time between ticks.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns a snapshot of the sweep counters.
    pub fn stats(&self) -> SweepSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
async fn sweeper_loop(
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    target: SweepTarget,
    mut ticker: Interval,
    stats: Arc<SweepStats>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        stats.ticks.fetch_add(1, Ordering::Relaxed);

        match sweep_once(store.as_ref(), clock.as_ref(), &target).await {
            Ok(0) => trace!(field = %target.field, "Sweep found no expired records"),
            Ok(cleared) => {
                stats.cleared.fetch_add(cleared, Ordering::Relaxed);
                debug!(cleared = cleared, field = %target.field, "Expired records cleared");
            }
            Err(reason) => {
                stats.failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %reason, "Expiry sweep failed, retrying next tick");
            }
        }
    }
}

/// Why a single tick did not clear anything.
#[derive(Debug, thiserror::Error)]
pub(crate) enum SweepError {
    /// The filter expression for this tick did not compile
    #[error("invalid sweep filter: {0}")]
    Query(#[from] QueryError),

    /// The store rejected the bulk delete
    #[error("clear failed: {0}")]
    Store(#[from] StoreError),
}

/// Runs a single sweep: compile the filter for "now" and clear matches.
pub(crate) async fn sweep_once(
    store: &dyn RecordStore,
    clock: &dyn Clock,
    target: &SweepTarget,
) -> std::result::Result<u64, SweepError> {
    let now = target.format.truncate(clock.now());
    let expr = Query::lte_expression(&target.field, &target.format.literal(now));

    let query = Query::parse(&expr)?;
    trace!(filter = %query, "Sweeping expired records");

    Ok(store.clear(&query).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::store::testing::RecordingStore;
    use crate::store::{Bound, MemoryStore};
    use crate::ttl::clock::{ManualClock, Moment};
    use chrono::DateTime;

    fn t0() -> Moment {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn target(format: ExpirationFormat) -> SweepTarget {
        SweepTarget {
            field: "expires_at".to_string(),
            format,
        }
    }

    #[tokio::test]
    async fn test_sweep_once_builds_lte_filter() {
        let store = RecordingStore::new();
        let clock = ManualClock::new(t0());

        sweep_once(&store, &clock, &target(ExpirationFormat::Timestamp))
            .await
            .unwrap();
        sweep_once(&store, &clock, &target(ExpirationFormat::EpochSeconds))
            .await
            .unwrap();

        let clears = store.clears();
        assert_eq!(clears.len(), 2);
        assert_eq!(clears[0].field(), "expires_at");
        assert_eq!(clears[0].bound(), Bound::Moment(t0()));
        assert_eq!(clears[1].bound(), Bound::EpochSeconds(1_700_000_000));
    }

    #[tokio::test]
    async fn test_sweep_once_quotes_unusual_field_names() {
        let store = RecordingStore::new();
        let clock = ManualClock::new(t0());

        for field in ["expires at", "a:b}", "say \"bye\"", "back\\slash"] {
            let odd = SweepTarget {
                field: field.to_string(),
                format: ExpirationFormat::EpochSeconds,
            };
            sweep_once(&store, &clock, &odd).await.unwrap();
        }

        let fields: Vec<String> = store.clears().iter().map(|q| q.field().to_string()).collect();
        assert_eq!(fields, vec!["expires at", "a:b}", "say \"bye\"", "back\\slash"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_deletes_under_field_name_with_space() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(t0());

        store.insert(Record::new("old").with("expires at", t0()));

        let sweeper = ExpirySweeper::start(
            store.clone(),
            Arc::new(clock.clone()),
            SweepTarget {
                field: "expires at".to_string(),
                format: ExpirationFormat::Timestamp,
            },
            Duration::from_secs(1),
        )
        .unwrap();

        clock.advance(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(store.is_empty());
        assert_eq!(sweeper.stats().failures, 0);
        assert_eq!(sweeper.stats().cleared, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_clears_once_per_tick() {
        let store = Arc::new(RecordingStore::new());
        let clock = ManualClock::new(t0());

        let sweeper = ExpirySweeper::start(
            store.clone(),
            Arc::new(clock.clone()),
            target(ExpirationFormat::Timestamp),
            Duration::from_secs(5),
        )
        .unwrap();

        // Nothing before the first interval elapses
        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert!(store.clears().is_empty());

        clock.set(t0() + chrono::TimeDelta::seconds(5));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.clears().len(), 1);
        assert_eq!(
            store.clears()[0].bound(),
            Bound::Moment(t0() + chrono::TimeDelta::seconds(5))
        );

        clock.set(t0() + chrono::TimeDelta::seconds(10));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.clears().len(), 2);
        assert_eq!(
            store.clears()[1].bound(),
            Bound::Moment(t0() + chrono::TimeDelta::seconds(10))
        );

        assert_eq!(sweeper.stats().ticks, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_survives_store_failures() {
        let store = Arc::new(RecordingStore::failing());
        let clock = Arc::new(ManualClock::new(t0()));

        let sweeper = ExpirySweeper::start(
            store.clone(),
            clock,
            target(ExpirationFormat::Timestamp),
            Duration::from_secs(1),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(store.clears().len(), 2);
        assert_eq!(sweeper.stats().failures, 2);

        store.set_fail_clears(false);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.clears().len(), 3);
        assert_eq!(sweeper.stats().failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_deletes_expired_records() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(t0());

        store.insert(Record::new("old").with("expires_at", t0()));
        store.insert(
            Record::new("new").with("expires_at", t0() + chrono::TimeDelta::seconds(60)),
        );

        let sweeper = ExpirySweeper::start(
            store.clone(),
            Arc::new(clock.clone()),
            target(ExpirationFormat::Timestamp),
            Duration::from_secs(1),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(store.len(), 1);
        assert!(store.get("new").is_some());
        assert_eq!(sweeper.stats().cleared, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_on_drop() {
        let store = Arc::new(RecordingStore::new());
        let clock = Arc::new(ManualClock::new(t0()));

        {
            let _sweeper = ExpirySweeper::start(
                store.clone(),
                clock,
                target(ExpirationFormat::Timestamp),
                Duration::from_secs(1),
            )
            .unwrap();
            tokio::time::sleep(Duration::from_millis(1_500)).await;
            // Sweeper is dropped here
        }

        let seen = store.clears().len();
        assert_eq!(seen, 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.clears().len(), seen);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let store = Arc::new(RecordingStore::new());
        let clock = Arc::new(ManualClock::new(t0()));

        let sweeper = ExpirySweeper::start(
            store,
            clock,
            target(ExpirationFormat::Timestamp),
            Duration::from_secs(60),
        )
        .unwrap();

        assert!(!sweeper.is_stopped());
        sweeper.stop();
        sweeper.stop();
        assert!(sweeper.is_stopped());
        assert_eq!(sweeper.interval(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_start_rejects_unschedulable_interval() {
        let result = ExpirySweeper::start(
            Arc::new(RecordingStore::new()),
            Arc::new(ManualClock::new(t0())),
            target(ExpirationFormat::Timestamp),
            Duration::from_secs(u64::MAX),
        );
        assert!(matches!(result, Err(TtlError::InvalidConfig(_))));
    }

    #[test]
    fn test_start_requires_runtime() {
        let result = ExpirySweeper::start(
            Arc::new(RecordingStore::new()),
            Arc::new(ManualClock::new(t0())),
            target(ExpirationFormat::Timestamp),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(TtlError::NoRuntime)));
    }
}
