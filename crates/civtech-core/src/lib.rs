//! Session, directory synchronization, and civilization lifecycle.
//!
//! This crate ties the tech tree, the attribute cipher, and the record
//! store together into the operations a client performs:
//!
//! ```text
//! Session::connect(signer, params, store)
//!     |
//!     +-- sync() ---------> DirectorySync::load --> Directory snapshot
//!     |
//!     +-- Lifecycle::create   --> record, then index, then re-sync
//!     +-- Lifecycle::research --> check, reveal, re-read, write, re-sync
//!     +-- Lifecycle::reveal   --> signed challenge, then decrypt
//! ```
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration with environment overrides
//! - [`session`] -- [`Session`] context for one connected identity
//! - [`directory`] -- [`Directory`] snapshots and single-flight loading
//! - [`lifecycle`] -- [`Lifecycle`] create, research, and reveal
//! - [`error`] -- The [`CoreError`] taxonomy

pub mod config;
pub mod directory;
pub mod error;
pub mod lifecycle;
pub mod session;

pub use config::{ClientConfig, ConfigError, StoreKind};
pub use directory::{
    Directory, DirectoryEntry, DirectorySync, LoadFailure, LoadFailureKind, LoadReport,
};
pub use error::CoreError;
pub use lifecycle::{Attribute, Lifecycle, LocalLifecycle, ResearchOutcome};
pub use session::{Session, SessionParams, open_store};
