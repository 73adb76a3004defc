//! Timeout-bounded store client with typed record operations.
//!
//! [`StoreBackend`] uses enum dispatch instead of trait objects because
//! async methods are not dyn-compatible. [`StoreClient`] wraps a backend,
//! bounds every call by the configured timeout, and layers the record and
//! index operations from [`crate::codec`] on top of the raw byte calls.

use std::future::Future;
use std::time::Duration;

use civtech_types::{Civilization, CivilizationId};
use tracing::{debug, warn};

use crate::codec::{
    INDEX_KEY, decode_index, decode_record, encode_index, encode_record, record_key,
};
use crate::dragonfly::DragonflyStore;
use crate::error::StoreError;
use crate::memory::MemoryStore;

/// A key-value backend.
#[derive(Clone)]
pub enum StoreBackend {
    /// A live `Dragonfly` instance.
    Dragonfly(DragonflyStore),
    /// The in-process store.
    Memory(MemoryStore),
}

impl StoreBackend {
    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::Dragonfly(_) => "dragonfly",
            Self::Memory(_) => "memory",
        }
    }

    async fn probe(&self) -> Result<(), StoreError> {
        match self {
            Self::Dragonfly(store) => store.probe().await,
            Self::Memory(store) => store.probe().await,
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self {
            Self::Dragonfly(store) => store.get(key).await,
            Self::Memory(store) => store.get(key).await,
        }
    }

    async fn set(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        match self {
            Self::Dragonfly(store) => store.set(key, bytes).await,
            Self::Memory(store) => store.set(key, bytes).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self {
            Self::Dragonfly(store) => store.delete(key).await,
            Self::Memory(store) => store.delete(key).await,
        }
    }
}

/// Store handle used by the directory and lifecycle layers.
#[derive(Clone)]
pub struct StoreClient {
    backend: StoreBackend,
    timeout: Duration,
}

impl StoreClient {
    /// Wrap `backend`, bounding each call by `timeout`.
    pub const fn new(backend: StoreBackend, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Client over a fresh in-memory store.
    pub fn memory(store: MemoryStore, timeout: Duration) -> Self {
        Self::new(StoreBackend::Memory(store), timeout)
    }

    /// The backend in use.
    pub const fn backend(&self) -> &StoreBackend {
        &self.backend
    }

    /// Whether the store currently answers.
    ///
    /// Failures and timeouts are logged and reported as `false`.
    pub async fn probe_available(&self) -> bool {
        match self.bounded("probe", INDEX_KEY, self.backend.probe()).await {
            Ok(()) => true,
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "store availability check failed");
                false
            }
        }
    }

    /// Read the raw bytes at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] on expiry, or the backend's error.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.bounded("get", key, self.backend.get(key)).await
    }

    /// Store raw bytes at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] on expiry, or the backend's error.
    pub async fn set(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.bounded("set", key, self.backend.set(key, bytes)).await
    }

    /// Delete `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] on expiry, or the backend's error.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.bounded("delete", key, self.backend.delete(key)).await
    }

    // =========================================================================
    // Index -- civilization_keys
    // =========================================================================

    /// Read the id index. A missing index is empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Decode`] if the index is not a JSON array of
    /// strings, or any transport error from [`Self::get`].
    pub async fn load_index(&self) -> Result<Vec<CivilizationId>, StoreError> {
        let Some(bytes) = self.get(INDEX_KEY).await? else {
            return Ok(Vec::new());
        };
        decode_index(&bytes).map_err(|source| StoreError::Decode {
            key: INDEX_KEY.to_owned(),
            source,
        })
    }

    /// Overwrite the id index.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Self::set`].
    pub async fn save_index(&self, ids: &[CivilizationId]) -> Result<(), StoreError> {
        let bytes = encode_index(ids).map_err(|e| StoreError::Encoding {
            key: INDEX_KEY.to_owned(),
            reason: e.to_string(),
        })?;
        self.set(INDEX_KEY, &bytes).await
    }

    // =========================================================================
    // Records -- civilization_{id}
    // =========================================================================

    /// Read the record for `id`, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Decode`] if the record cannot be parsed, or
    /// any transport error from [`Self::get`].
    pub async fn load_record(
        &self,
        id: &CivilizationId,
    ) -> Result<Option<Civilization>, StoreError> {
        let key = record_key(id);
        let Some(bytes) = self.get(&key).await? else {
            return Ok(None);
        };
        decode_record(id, &bytes)
            .map(Some)
            .map_err(|source| StoreError::Decode { key, source })
    }

    /// Write the record under its own id.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Self::set`].
    pub async fn save_record(&self, civ: &Civilization) -> Result<(), StoreError> {
        let key = record_key(&civ.id);
        let bytes = encode_record(civ).map_err(|e| StoreError::Encoding {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        self.set(&key, &bytes).await?;
        debug!(civilization_id = %civ.id, version = civ.version, "record written");
        Ok(())
    }

    /// Delete the record for `id`.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Self::delete`].
    pub async fn delete_record(&self, id: &CivilizationId) -> Result<(), StoreError> {
        self.delete(&record_key(id)).await
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        key: &str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res,
            Err(_elapsed) => {
                let limit_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(backend = self.backend.name(), op, key, limit_ms, "store call timed out");
                Err(StoreError::Timeout {
                    op,
                    key: key.to_owned(),
                    limit_ms,
                })
            }
        }
    }
}
