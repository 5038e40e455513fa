//! Sharded In-Memory Record Store
//!
//! A [`RecordStore`] that keeps records in process memory. It backs the demo
//! binary, the benchmarks and the engine tests; production hosts plug in their
//! own backend.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       MemoryStore                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Record ids are hashed onto shards so that corrections from concurrent reads
//! and the sweeper's bulk clear only contend when they touch the same shard.

use crate::record::Record;
use crate::store::{Query, RecordStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Number of shards. Small stores do not need the 64 a cache server would use.
const NUM_SHARDS: usize = 16;

#[derive(Debug, Default)]
struct Shard {
    records: RwLock<HashMap<String, Record>>,
}

impl Shard {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Record>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Record>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Point-in-time statistics of a [`MemoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    /// Records currently stored
    pub records: u64,
    /// Successful `update` calls
    pub updates: u64,
    /// `clear` calls
    pub clears: u64,
    /// Records removed by `clear`
    pub cleared: u64,
}

/// A thread-safe, sharded, in-memory record store.
///
/// # Example
///
/// ```
/// use ttlkeeper::{MemoryStore, Record};
///
/// let store = MemoryStore::new();
/// store.insert(Record::new("a").with("ttl", 10));
/// assert_eq!(store.len(), 1);
/// assert!(store.get("a").is_some());
/// ```
pub struct MemoryStore {
    shards: Vec<Shard>,

    /// Statistics: number of records (approximate under concurrency)
    record_count: AtomicU64,

    /// Statistics: successful updates
    update_count: AtomicU64,

    /// Statistics: clear calls
    clear_count: AtomicU64,

    /// Statistics: records removed by clear
    cleared_count: AtomicU64,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("shards", &self.shards.len())
            .field("record_count", &self.record_count.load(Ordering::Relaxed))
            .field("update_count", &self.update_count.load(Ordering::Relaxed))
            .field("clear_count", &self.clear_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| Shard::default()).collect(),
            record_count: AtomicU64::new(0),
            update_count: AtomicU64::new(0),
            clear_count: AtomicU64::new(0),
            cleared_count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard(&self, id: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % NUM_SHARDS]
    }

    /// Stores a record, replacing any record with the same id.
    ///
    /// Returns `true` if the id was new.
    pub fn insert(&self, record: Record) -> bool {
        let mut records = self.shard(record.id()).write();
        let is_new = records.insert(record.id().to_string(), record).is_none();
        if is_new {
            self.record_count.fetch_add(1, Ordering::Relaxed);
        }
        is_new
    }

    /// Returns a copy of the record with the given id.
    pub fn get(&self, id: &str) -> Option<Record> {
        self.shard(id).read().get(id).cloned()
    }

    /// Returns a copy of every record, ordered by id.
    pub fn list(&self) -> Vec<Record> {
        let mut all: Vec<Record> = self
            .shards
            .iter()
            .flat_map(|shard| shard.read().values().cloned().collect::<Vec<_>>())
            .collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    /// Removes a record, returning it.
    pub fn remove(&self, id: &str) -> Option<Record> {
        let removed = self.shard(id).write().remove(id);
        if removed.is_some() {
            self.record_count.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Number of stored records.
    pub fn len(&self) -> u64 {
        self.record_count.load(Ordering::Relaxed)
    }

    /// Returns true if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the store statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            records: self.len(),
            updates: self.update_count.load(Ordering::Relaxed),
            clears: self.clear_count.load(Ordering::Relaxed),
            cleared: self.cleared_count.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn update(&self, record: &Record, original: &Record) -> Result<(), StoreError> {
        let mut records = self.shard(original.id()).write();
        match records.get_mut(original.id()) {
            Some(stored) => {
                *stored = record.clone();
                self.update_count.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            None => Err(StoreError::NotFound(original.id().to_string())),
        }
    }

    async fn clear(&self, query: &Query) -> Result<u64, StoreError> {
        self.clear_count.fetch_add(1, Ordering::Relaxed);

        let mut removed = 0u64;
        for shard in &self.shards {
            let mut records = shard.write();
            let before = records.len();
            records.retain(|_, record| !query.matches(record));
            removed += (before - records.len()) as u64;
        }

        if removed > 0 {
            self.record_count.fetch_sub(removed, Ordering::Relaxed);
            self.cleared_count.fetch_add(removed, Ordering::Relaxed);
        }

        Ok(removed)
    }
}
