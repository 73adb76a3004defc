//! In-process record backend with fault injection.
//!
//! Used by tests and offline runs. Faults can be switched on per key so
//! partial-failure paths (a broken record, a refused index write) are
//! reproducible without a live store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::error::StoreError;

/// A shared, cloneable in-memory key-value store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: BTreeMap<String, Vec<u8>>,
    unavailable: bool,
    failing_reads: BTreeSet<String>,
    failing_writes: BTreeSet<String>,
    latency: Duration,
    writes: u64,
}

impl MemoryStore {
    /// Create an empty, available store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the availability check fail or succeed.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }

    /// Make reads of `key` fail until cleared.
    pub async fn fail_reads(&self, key: &str) {
        self.state.lock().await.failing_reads.insert(key.to_owned());
    }

    /// Make writes to `key` fail until cleared.
    pub async fn fail_writes(&self, key: &str) {
        self.state.lock().await.failing_writes.insert(key.to_owned());
    }

    /// Remove every injected read and write failure.
    pub async fn clear_faults(&self) {
        let mut state = self.state.lock().await;
        state.failing_reads.clear();
        state.failing_writes.clear();
        state.unavailable = false;
    }

    /// Delay every operation by `latency`.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = latency;
    }

    /// Store bytes directly, bypassing faults and the write counter.
    pub async fn put_raw(&self, key: &str, bytes: &[u8]) {
        self.state
            .lock()
            .await
            .entries
            .insert(key.to_owned(), bytes.to_vec());
    }

    /// Read bytes directly, bypassing faults.
    pub async fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.state.lock().await.entries.get(key).cloned()
    }

    /// Number of successful writes and deletes so far.
    pub async fn write_count(&self) -> u64 {
        self.state.lock().await.writes
    }

    /// Fail unless the store is marked available.
    pub async fn probe(&self) -> Result<(), StoreError> {
        self.delay().await;
        if self.state.lock().await.unavailable {
            return Err(StoreError::Unavailable(String::from(
                "memory store marked unavailable",
            )));
        }
        Ok(())
    }

    /// Read the bytes at `key`.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.delay().await;
        let state = self.state.lock().await;
        if state.failing_reads.contains(key) {
            return Err(StoreError::Unavailable(format!("injected read failure on {key}")));
        }
        Ok(state.entries.get(key).cloned())
    }

    /// Store `bytes` at `key`.
    pub async fn set(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.delay().await;
        let mut state = self.state.lock().await;
        if state.failing_writes.contains(key) {
            return Err(StoreError::WriteFailed {
                key: key.to_owned(),
                reason: String::from("injected write failure"),
            });
        }
        state.entries.insert(key.to_owned(), bytes.to_vec());
        state.writes = state.writes.saturating_add(1);
        Ok(())
    }

    /// Delete `key`. Deleting a missing key succeeds.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.delay().await;
        let mut state = self.state.lock().await;
        if state.failing_writes.contains(key) {
            return Err(StoreError::WriteFailed {
                key: key.to_owned(),
                reason: String::from("injected delete failure"),
            });
        }
        state.entries.remove(key);
        state.writes = state.writes.saturating_add(1);
        Ok(())
    }

    async fn delay(&self) {
        let latency = self.state.lock().await.latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}
