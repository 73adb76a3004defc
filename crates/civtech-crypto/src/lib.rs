//! Attribute cipher and signature-gated reveal for civtech.
//!
//! Civilization attributes are stored as opaque [`EncryptedValue`] tokens.
//! This crate turns numbers into tokens and back, and gates the way back
//! behind a challenge the connected identity must sign.
//!
//! ```text
//! Decimal --encrypt--> EncryptedValue --> store
//!
//! store --> EncryptedValue --+
//!                            |  Authorizer::reveal
//!   Challenge --sign--> IdentitySigner (may decline)
//!                            |
//!                            +--> DecryptionService --> Decimal
//! ```
//!
//! # Modules
//!
//! - [`cipher`] -- [`AttributeCipher`] and the keyless [`PlaceholderCipher`]
//! - [`challenge`] -- The canonical five-line [`Challenge`] message
//! - [`signer`] -- [`IdentitySigner`] seam and the ed25519 [`LocalSigner`]
//! - [`authorize`] -- [`Authorizer`] and the [`DecryptionService`] seam
//! - [`cancel`] -- [`CancelToken`] for aborting in-flight operations
//! - [`error`] -- Cipher, signing, and reveal errors
//!
//! [`EncryptedValue`]: civtech_types::EncryptedValue

pub mod authorize;
pub mod base64;
pub mod cancel;
pub mod challenge;
pub mod cipher;
pub mod error;
pub mod signer;

pub use authorize::{Authorizer, DecryptionService, LocalDecryptionService, RevealTimeouts};
pub use cancel::CancelToken;
pub use challenge::Challenge;
pub use cipher::{AttributeCipher, PlaceholderCipher, SCHEME_TAG};
pub use error::{AuthError, AuthStage, CipherError, DenialReason, SignError};
pub use signer::{IdentitySigner, LocalSigner, SessionKey};
