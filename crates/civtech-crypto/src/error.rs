//! Error types for the cipher and the reveal protocol.

use core::fmt;

/// Errors produced when reading an attribute token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    /// The token could not be decoded into a number.
    #[error("malformed attribute token {token:?}: {reason}")]
    Malformed {
        /// The offending token text.
        token: String,
        /// What went wrong.
        reason: String,
    },
}

/// Errors produced by an identity signer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignError {
    /// The user declined to sign.
    #[error("user rejected the signature request")]
    Rejected,

    /// The identity is not connected.
    #[error("identity is not connected")]
    Disconnected,

    /// Key material could not be loaded.
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

/// Why a reveal was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    /// No identity is connected.
    NoIdentity,
    /// The identity declined to sign the challenge.
    Rejected,
    /// The challenge validity window has passed.
    ChallengeExpired,
    /// The signer failed for another reason.
    SignerFailed(String),
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoIdentity => f.write_str("no connected identity"),
            Self::Rejected => f.write_str("signature rejected by user"),
            Self::ChallengeExpired => f.write_str("challenge expired"),
            Self::SignerFailed(msg) => write!(f, "signer failed: {msg}"),
        }
    }
}

/// The step of the reveal protocol an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    /// Waiting for the identity to sign the challenge.
    Signing,
    /// Waiting for the decryption round trip.
    Decryption,
}

impl fmt::Display for AuthStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signing => f.write_str("signing"),
            Self::Decryption => f.write_str("decryption"),
        }
    }
}

/// Errors produced by the reveal protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The reveal was refused; nothing was decrypted.
    #[error("not authorized: {0}")]
    NotAuthorized(DenialReason),

    /// A protocol step exceeded its deadline.
    #[error("{stage} timed out after {limit_ms}ms")]
    Timeout {
        /// The step that timed out.
        stage: AuthStage,
        /// The configured limit in milliseconds.
        limit_ms: u64,
    },

    /// The caller cancelled the reveal.
    #[error("{0} cancelled")]
    Cancelled(AuthStage),

    /// The token could not be decrypted.
    #[error(transparent)]
    Cipher(#[from] CipherError),
}
