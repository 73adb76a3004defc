//! `Dragonfly` (Redis-compatible) record backend.

use fred::prelude::*;

use crate::codec::INDEX_KEY;
use crate::error::StoreError;

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
///
/// Values are stored as UTF-8 strings; every payload civtech writes is
/// JSON text.
#[derive(Clone)]
pub struct DragonflyStore {
    client: Client,
}

impl DragonflyStore {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed.
    /// Returns [`StoreError::Backend`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let config = Config::from_url(url)
            .map_err(|e| StoreError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!(url, "Connected to Dragonfly");
        Ok(Self { client })
    }

    /// Check that the connection is up and answers a round trip.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the client is disconnected.
    /// Returns [`StoreError::Backend`] if the round trip fails.
    pub async fn probe(&self) -> Result<(), StoreError> {
        if !self.client.is_connected() {
            return Err(StoreError::Unavailable(String::from(
                "Dragonfly client is not connected",
            )));
        }
        let _: u32 = self.client.exists(INDEX_KEY).await?;
        Ok(())
    }

    /// Read the raw bytes at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the read fails.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let value: Option<String> = self.client.get(key).await?;
        Ok(value.map(String::into_bytes))
    }

    /// Store `bytes` at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Encoding`] if `bytes` is not UTF-8.
    /// Returns [`StoreError::WriteFailed`] if the write fails.
    pub async fn set(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let text = std::str::from_utf8(bytes).map_err(|e| StoreError::Encoding {
            key: key.to_owned(),
            reason: e.to_string(),
        })?;
        let written: Result<(), fred::error::Error> =
            self.client.set(key, text, None, None, false).await;
        written.map_err(|e| StoreError::WriteFailed {
            key: key.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Delete `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the delete fails.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _: u32 = self.client.del(key).await?;
        Ok(())
    }

    /// Flush all keys from the `Dragonfly` instance.
    ///
    /// **WARNING:** This deletes all data. Only use for testing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the flush fails.
    pub async fn flush_all(&self) -> Result<(), StoreError> {
        let _: () = self.client.flushall(false).await?;
        Ok(())
    }
}
