//! Per-identity session context.
//!
//! A [`Session`] exists from the moment an identity connects until it
//! disconnects. It carries everything core operations need: the signer,
//! the challenge parameters, and the directory snapshot.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use civtech_crypto::{Challenge, IdentitySigner, SessionKey};
use civtech_store::{DragonflyStore, MemoryStore, StoreBackend, StoreClient};
use civtech_types::OwnerAddress;
use tracing::info;

use crate::config::{ClientConfig, StoreConfig, StoreKind};
use crate::directory::{Directory, DirectorySync, LoadReport};
use crate::error::CoreError;

/// Fixed challenge parameters for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    /// Address of the record store.
    pub contract_address: String,
    /// Active network id.
    pub chain_id: u64,
    /// Days a signed challenge stays valid.
    pub duration_days: u32,
}

impl SessionParams {
    /// Take the challenge parameters from client configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            contract_address: config.store.contract_address.clone(),
            chain_id: config.auth.chain_id,
            duration_days: config.auth.duration_days,
        }
    }
}

/// Context of one connected identity.
pub struct Session<S> {
    signer: S,
    key: SessionKey,
    params: SessionParams,
    start_timestamp: i64,
    connected: AtomicBool,
    directory: DirectorySync,
}

impl<S: IdentitySigner> Session<S> {
    /// Start a session for a connected identity, timestamped now.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotConnected`] if `signer` has no identity.
    pub fn connect(
        signer: S,
        params: SessionParams,
        store: StoreClient,
    ) -> Result<Self, CoreError> {
        Self::connect_at(signer, params, store, unix_now())
    }

    /// Start a session with an explicit start timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotConnected`] if `signer` has no identity.
    pub fn connect_at(
        signer: S,
        params: SessionParams,
        store: StoreClient,
        start_timestamp: i64,
    ) -> Result<Self, CoreError> {
        let identity = signer.address().ok_or(CoreError::NotConnected)?;
        let key = SessionKey::generate();
        info!(%identity, start_timestamp, session_key = %key.public_key_hex(), "session connected");
        Ok(Self {
            signer,
            key,
            params,
            start_timestamp,
            connected: AtomicBool::new(true),
            directory: DirectorySync::new(store),
        })
    }

    /// Tear the session down: forget the directory and refuse further
    /// operations.
    pub async fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
        self.directory.clear().await;
        info!("session disconnected");
    }

    /// Whether the session and its identity are both still connected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && self.signer.is_connected()
    }

    /// The connected identity, or `None` once disconnected.
    pub fn identity(&self) -> Option<OwnerAddress> {
        if self.connected.load(Ordering::Acquire) {
            self.signer.address()
        } else {
            None
        }
    }

    /// The identity's signer.
    pub const fn signer(&self) -> &S {
        &self.signer
    }

    /// Challenge parameters.
    pub const fn params(&self) -> &SessionParams {
        &self.params
    }

    /// The challenge this session asks the identity to sign.
    pub fn challenge(&self) -> Challenge {
        Challenge {
            public_key: self.key.public_key_hex(),
            contract_address: self.params.contract_address.clone(),
            chain_id: self.params.chain_id,
            start_timestamp: self.start_timestamp,
            duration_days: self.params.duration_days,
        }
    }

    /// The store behind this session.
    pub const fn store(&self) -> &StoreClient {
        self.directory.store()
    }

    /// The latest directory snapshot.
    pub async fn directory(&self) -> Arc<Directory> {
        self.directory.snapshot().await
    }

    /// Reload the directory for this identity.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotConnected`] after [`Self::disconnect`].
    pub async fn sync(&self) -> Result<LoadReport, CoreError> {
        let identity = self.identity().ok_or(CoreError::NotConnected)?;
        Ok(self.directory.load(Some(&identity)).await)
    }
}

/// Connect to the store described by `config`.
///
/// # Errors
///
/// Returns [`CoreError::StoreUnavailable`] if `Dragonfly` cannot be
/// reached.
pub async fn open_store(config: &StoreConfig) -> Result<StoreClient, CoreError> {
    let backend = match config.backend {
        StoreKind::Dragonfly => {
            StoreBackend::Dragonfly(DragonflyStore::connect(&config.url).await?)
        }
        StoreKind::Memory => StoreBackend::Memory(MemoryStore::new()),
    };
    info!(backend = backend.name(), "record store opened");
    Ok(StoreClient::new(backend, config.timeout()))
}

/// Current unix time in seconds.
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
