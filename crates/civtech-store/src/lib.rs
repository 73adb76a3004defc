//! Record store for civtech (`Dragonfly` or in-memory).
//!
//! All civilizations live in a shared key-value store: one JSON index of
//! ids plus one JSON record per civilization. This crate owns the wire
//! format and the store connection; it knows nothing about research
//! rules or attribute encryption.
//!
//! ```text
//! StoreClient (timeout-bounded)
//!     |
//!     +-- StoreBackend::Dragonfly --> fred client
//!     +-- StoreBackend::Memory   --> MemoryStore (fault injection)
//! ```
//!
//! # Modules
//!
//! - [`client`] -- [`StoreClient`] and typed index/record operations
//! - [`codec`] -- Key patterns and JSON wire format
//! - [`dragonfly`] -- `Dragonfly` backend
//! - [`memory`] -- In-process backend
//! - [`error`] -- Shared error types

pub mod client;
pub mod codec;
pub mod dragonfly;
pub mod error;
pub mod memory;

pub use client::{StoreBackend, StoreClient};
pub use codec::{INDEX_KEY, record_key};
pub use dragonfly::DragonflyStore;
pub use error::{DecodeError, StoreError};
pub use memory::MemoryStore;
