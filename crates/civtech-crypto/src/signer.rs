//! Identity signing and per-session keys.
//!
//! The identity provider (usually a browser wallet) is an
//! external collaborator. [`IdentitySigner`] is the seam; [`LocalSigner`]
//! is an in-process ed25519 implementation used by the CLI and tests.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use civtech_types::OwnerAddress;
use ed25519_dalek::{Signer as _, SigningKey};

use crate::error::SignError;

/// A connected identity able to sign challenge messages.
pub trait IdentitySigner: Send + Sync {
    /// The identity's address, or `None` while disconnected.
    fn address(&self) -> Option<OwnerAddress>;

    /// Whether the identity is currently connected.
    fn is_connected(&self) -> bool {
        self.address().is_some()
    }

    /// Ask the identity to sign `message`.
    ///
    /// The user may decline, in which case [`SignError::Rejected`] is
    /// returned.
    fn sign(&self, message: &str) -> impl Future<Output = Result<String, SignError>> + Send;
}

/// An in-process ed25519 identity.
///
/// The address is `0x` followed by the hex verifying key. Signatures are
/// `0x`-prefixed hex. Connection state and user rejection can be toggled
/// to model wallet behaviour.
#[derive(Debug)]
pub struct LocalSigner {
    key: SigningKey,
    connected: AtomicBool,
    rejecting: AtomicBool,
}

impl LocalSigner {
    /// Create a signer from a raw 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(seed),
            connected: AtomicBool::new(true),
            rejecting: AtomicBool::new(false),
        }
    }

    /// Create a signer from a 64-character hex seed.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::InvalidKey`] if the text is not 32 bytes of hex.
    pub fn from_hex_seed(seed_hex: &str) -> Result<Self, SignError> {
        let trimmed = seed_hex.trim();
        let bytes = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
            .map_err(|e| SignError::InvalidKey(format!("seed is not hex: {e}")))?;
        let seed: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            SignError::InvalidKey(format!("seed is {} bytes, expected 32", v.len()))
        })?;
        Ok(Self::from_seed(&seed))
    }

    /// Generate a signer with a random key.
    pub fn generate() -> Self {
        Self::from_seed(&rand::random::<[u8; 32]>())
    }

    /// Mark the identity connected or disconnected.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// Make subsequent signature requests succeed or be declined.
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::Release);
    }

    /// The address regardless of connection state.
    pub fn address_unchecked(&self) -> OwnerAddress {
        OwnerAddress(format!("0x{}", hex::encode(self.key.verifying_key().as_bytes())))
    }
}

impl IdentitySigner for LocalSigner {
    fn address(&self) -> Option<OwnerAddress> {
        self.connected
            .load(Ordering::Acquire)
            .then(|| self.address_unchecked())
    }

    async fn sign(&self, message: &str) -> Result<String, SignError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(SignError::Disconnected);
        }
        if self.rejecting.load(Ordering::Acquire) {
            return Err(SignError::Rejected);
        }
        let signature = self.key.sign(message.as_bytes());
        Ok(format!("0x{}", hex::encode(signature.to_bytes())))
    }
}

/// Ephemeral key pair created when a session starts.
///
/// Its public half is the `publickey` field of every challenge the
/// session issues.
#[derive(Debug)]
pub struct SessionKey {
    key: SigningKey,
}

impl SessionKey {
    /// Generate a fresh random session key.
    pub fn generate() -> Self {
        Self::from_seed(&rand::random::<[u8; 32]>())
    }

    /// Create a deterministic session key from a seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(seed),
        }
    }

    /// `0x`-prefixed hex of the public key.
    pub fn public_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.key.verifying_key().as_bytes()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    use super::*;

    #[tokio::test]
    async fn signature_verifies_against_address() {
        let signer = LocalSigner::from_seed(&[7u8; 32]);
        let sig_hex = signer.sign("hello").await.unwrap();

        let address = signer.address().unwrap();
        let key_bytes: [u8; 32] = hex::decode(address.as_str().trim_start_matches("0x"))
            .unwrap()
            .try_into()
            .unwrap();
        let sig_bytes: [u8; 64] = hex::decode(sig_hex.trim_start_matches("0x"))
            .unwrap()
            .try_into()
            .unwrap();

        let key = VerifyingKey::from_bytes(&key_bytes).unwrap();
        assert!(key.verify(b"hello", &Signature::from_bytes(&sig_bytes)).is_ok());
    }

    #[tokio::test]
    async fn rejection_and_disconnect_are_reported() {
        let signer = LocalSigner::generate();
        signer.set_rejecting(true);
        assert_eq!(signer.sign("m").await, Err(SignError::Rejected));

        signer.set_connected(false);
        assert!(signer.address().is_none());
        assert!(!signer.is_connected());
        assert_eq!(signer.sign("m").await, Err(SignError::Disconnected));
    }

    #[test]
    fn hex_seed_loading() {
        let seed = "0x".to_owned() + &"11".repeat(32);
        let a = LocalSigner::from_hex_seed(&seed).unwrap();
        let b = LocalSigner::from_seed(&[0x11; 32]);
        assert_eq!(a.address_unchecked(), b.address_unchecked());

        assert!(matches!(
            LocalSigner::from_hex_seed("abcd"),
            Err(SignError::InvalidKey(_))
        ));
        assert!(matches!(
            LocalSigner::from_hex_seed("zz"),
            Err(SignError::InvalidKey(_))
        ));
    }

    #[test]
    fn session_keys_differ() {
        let a = SessionKey::generate();
        let b = SessionKey::generate();
        assert_ne!(a.public_key_hex(), b.public_key_hex());
        assert_eq!(a.public_key_hex().len(), 2 + 64);
    }
}
