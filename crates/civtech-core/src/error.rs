//! Error taxonomy surfaced by core operations.
//!
//! Every failure is returned to the caller at the operation boundary; none
//! is retried automatically. [`CoreError::reason`] gives the short,
//! user-facing text for each kind, distinct per variant.

use civtech_crypto::{AuthError, DenialReason};
use civtech_store::StoreError;
use civtech_tree::ResearchError;
use civtech_types::TechId;
use rust_decimal::Decimal;

/// Errors returned by session, directory, and lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A stored payload or attribute token could not be read.
    #[error("cannot parse {what}: {reason}")]
    ParseFailure {
        /// What was being parsed (a store key or attribute name).
        what: String,
        /// What went wrong.
        reason: String,
    },

    /// The identity refused or was unable to authorize a reveal.
    #[error("not authorized: {0}")]
    NotAuthorized(DenialReason),

    /// A prerequisite of the requested technology is not discovered.
    #[error("missing prerequisites for {tech}: {missing:?}")]
    PrerequisiteUnmet {
        /// The requested technology.
        tech: TechId,
        /// Prerequisites not yet discovered.
        missing: Vec<TechId>,
    },

    /// The civilization cannot afford the research cost.
    #[error("not enough research points: have {available}, need {required}")]
    InsufficientPoints {
        /// Decrypted points available.
        available: Decimal,
        /// Cost of the technology.
        required: Decimal,
    },

    /// No identity is connected to the session.
    #[error("no connected identity")]
    NotConnected,

    /// The session's identity owns no civilization, or its record is gone.
    #[error("civilization not found")]
    CivilizationNotFound,

    /// A store write was rejected; persisted state is unchanged.
    #[error("write to {key:?} failed: {reason}")]
    WriteFailed {
        /// The key being written.
        key: String,
        /// What went wrong.
        reason: String,
    },

    /// The technology id is not part of the tree.
    #[error("technology not found: {0}")]
    UnknownTechnology(TechId),

    /// The technology has already been discovered.
    #[error("technology already discovered: {0}")]
    AlreadyDiscovered(TechId),

    /// The persisted record changed since the session last loaded it.
    #[error("record changed concurrently: expected version {expected}, found {found}")]
    StaleRecord {
        /// Version the session held.
        expected: u64,
        /// Version found in the store.
        found: u64,
    },

    /// The civilization name is empty.
    #[error("civilization name must not be empty")]
    InvalidName,

    /// An operation exceeded its deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

impl CoreError {
    /// Short human-readable reason, distinct for every variant.
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::StoreUnavailable(_) => "Record store is unavailable",
            Self::ParseFailure { .. } => "Stored data could not be read",
            Self::NotAuthorized(_) => "Authorization was not granted",
            Self::PrerequisiteUnmet { .. } => "Missing prerequisites",
            Self::InsufficientPoints { .. } => "Not enough research points",
            Self::NotConnected => "Please connect your wallet first",
            Self::CivilizationNotFound => "Civilization not found",
            Self::WriteFailed { .. } => "Saving to the record store failed",
            Self::UnknownTechnology(_) => "Technology not found",
            Self::AlreadyDiscovered(_) => "Technology already researched",
            Self::StaleRecord { .. } => "Civilization was updated elsewhere, reload and retry",
            Self::InvalidName => "Civilization name is required",
            Self::Timeout(_) => "Operation timed out",
            Self::Cancelled => "Operation cancelled",
        }
    }

    /// Map a store error raised by a write.
    ///
    /// Transport and backend failures become [`CoreError::WriteFailed`];
    /// timeouts stay [`CoreError::Timeout`].
    pub fn from_write(key: &str, err: StoreError) -> Self {
        match err {
            StoreError::Timeout { .. } => Self::Timeout(err.to_string()),
            StoreError::WriteFailed { key, reason } => Self::WriteFailed { key, reason },
            other => Self::WriteFailed {
                key: key.to_owned(),
                reason: other.to_string(),
            },
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout { .. } => Self::Timeout(err.to_string()),
            StoreError::Decode { key, source } => Self::ParseFailure {
                what: key,
                reason: source.to_string(),
            },
            StoreError::WriteFailed { key, reason } | StoreError::Encoding { key, reason } => {
                Self::WriteFailed { key, reason }
            }
            StoreError::Unavailable(_) | StoreError::Backend(_) | StoreError::Config(_) => {
                Self::StoreUnavailable(err.to_string())
            }
        }
    }
}

impl From<AuthError> for CoreError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotAuthorized(reason) => Self::NotAuthorized(reason),
            AuthError::Timeout { .. } => Self::Timeout(err.to_string()),
            AuthError::Cancelled(_) => Self::Cancelled,
            AuthError::Cipher(e) => Self::ParseFailure {
                what: String::from("attribute token"),
                reason: e.to_string(),
            },
        }
    }
}

impl From<ResearchError> for CoreError {
    fn from(err: ResearchError) -> Self {
        match err {
            ResearchError::NotConnected => Self::NotConnected,
            ResearchError::UnknownTechnology(t) => Self::UnknownTechnology(t),
            ResearchError::AlreadyDiscovered(t) => Self::AlreadyDiscovered(t),
            ResearchError::PrerequisiteUnmet { tech, missing } => {
                Self::PrerequisiteUnmet { tech, missing }
            }
            ResearchError::InsufficientPoints {
                available,
                required,
            } => Self::InsufficientPoints {
                available,
                required,
            },
        }
    }
}
