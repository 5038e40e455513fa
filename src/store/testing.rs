//! Test double that records every call and can be told to fail.

use crate::record::Record;
use crate::store::{Query, RecordStore, StoreError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub(crate) struct RecordingStore {
    updates: Mutex<Vec<Record>>,
    clears: Mutex<Vec<Query>>,
    fail_updates: AtomicBool,
    fail_clears: AtomicBool,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        let store = Self::default();
        store.fail_updates.store(true, Ordering::SeqCst);
        store.fail_clears.store(true, Ordering::SeqCst);
        store
    }

    pub(crate) fn set_fail_clears(&self, fail: bool) {
        self.fail_clears.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn updates(&self) -> Vec<Record> {
        self.updates.lock().unwrap().clone()
    }

    pub(crate) fn clears(&self) -> Vec<Query> {
        self.clears.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for RecordingStore {
    async fn update(&self, record: &Record, _original: &Record) -> Result<(), StoreError> {
        self.updates.lock().unwrap().push(record.clone());
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("update rejected".to_string()));
        }
        Ok(())
    }

    async fn clear(&self, query: &Query) -> Result<u64, StoreError> {
        self.clears.lock().unwrap().push(query.clone());
        if self.fail_clears.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("clear rejected".to_string()));
        }
        Ok(0)
    }
}
