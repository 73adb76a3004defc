//! Signature-gated attribute reveal.
//!
//! [`Authorizer::reveal`] is the only path from an [`EncryptedValue`] to a
//! number:
//!
//! 1. the identity must be connected, else [`DenialReason::NoIdentity`];
//! 2. the canonical [`Challenge`] message is built;
//! 3. the identity is asked to sign it, bounded by the signing timeout;
//! 4. a declined signature aborts with [`DenialReason::Rejected`];
//! 5. only then is the token handed to the [`DecryptionService`], bounded
//!    by the reveal timeout.
//!
//! The signature is not verified here. Verification belongs to whoever
//! holds the decryption key; this module only gates local control flow on
//! signing having succeeded. Both awaits also race the caller's
//! [`CancelToken`].

use std::future::Future;
use std::time::Duration;

use civtech_types::EncryptedValue;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::challenge::Challenge;
use crate::cipher::AttributeCipher;
use crate::error::{AuthError, AuthStage, CipherError, DenialReason, SignError};
use crate::signer::IdentitySigner;

/// Performs the decryption round trip once a reveal is authorized.
pub trait DecryptionService: Send + Sync {
    /// Decrypt `token`.
    fn decrypt(
        &self,
        token: &EncryptedValue,
    ) -> impl Future<Output = Result<Decimal, CipherError>> + Send;
}

/// Decrypts locally with an [`AttributeCipher`] after a fixed latency.
///
/// Stands in for a remote decryption service; the latency models its
/// round trip.
#[derive(Debug, Clone)]
pub struct LocalDecryptionService<C> {
    cipher: C,
    latency: Duration,
}

impl<C: AttributeCipher> LocalDecryptionService<C> {
    /// Wrap `cipher`, answering after `latency`.
    pub const fn new(cipher: C, latency: Duration) -> Self {
        Self { cipher, latency }
    }
}

impl<C: AttributeCipher> DecryptionService for LocalDecryptionService<C> {
    async fn decrypt(&self, token: &EncryptedValue) -> Result<Decimal, CipherError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.cipher.decrypt(token)
    }
}

/// Deadlines for the two awaited steps of a reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealTimeouts {
    /// Maximum time to wait for the identity's signature.
    pub sign: Duration,
    /// Maximum time to wait for the decryption round trip.
    pub reveal: Duration,
}

impl Default for RevealTimeouts {
    fn default() -> Self {
        Self {
            sign: Duration::from_secs(120),
            reveal: Duration::from_secs(10),
        }
    }
}

/// Gates attribute reveal behind a signed challenge.
#[derive(Debug, Clone)]
pub struct Authorizer<D> {
    service: D,
    timeouts: RevealTimeouts,
}

impl<D: DecryptionService> Authorizer<D> {
    /// Create an authorizer over a decryption service.
    pub const fn new(service: D, timeouts: RevealTimeouts) -> Self {
        Self { service, timeouts }
    }

    /// Reveal the number behind `token` if `signer` authorizes it.
    ///
    /// `now` is checked against the challenge validity window.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NotAuthorized`] if no identity is connected, the
    ///   challenge has expired, or the signature is declined or fails
    /// - [`AuthError::Timeout`] if signing or decryption exceeds its limit
    /// - [`AuthError::Cancelled`] if `cancel` fires first
    /// - [`AuthError::Cipher`] if the token cannot be decrypted
    pub async fn reveal<S: IdentitySigner>(
        &self,
        signer: &S,
        challenge: &Challenge,
        token: &EncryptedValue,
        cancel: &CancelToken,
        now: i64,
    ) -> Result<Decimal, AuthError> {
        let Some(identity) = signer.address() else {
            warn!("reveal refused: no connected identity");
            return Err(AuthError::NotAuthorized(DenialReason::NoIdentity));
        };
        if challenge.is_expired(now) {
            warn!(
                %identity,
                expires_at = challenge.expires_at(),
                "reveal refused: challenge expired"
            );
            return Err(AuthError::NotAuthorized(DenialReason::ChallengeExpired));
        }

        let message = challenge.to_message();
        debug!(%identity, "requesting challenge signature");

        let signed = bounded(
            signer.sign(&message),
            self.timeouts.sign,
            cancel,
            AuthStage::Signing,
        )
        .await?;

        if let Err(e) = signed {
            warn!(%identity, error = %e, "reveal refused by signer");
            return Err(AuthError::NotAuthorized(match e {
                SignError::Rejected => DenialReason::Rejected,
                SignError::Disconnected => DenialReason::NoIdentity,
                SignError::InvalidKey(msg) => DenialReason::SignerFailed(msg),
            }));
        }

        let value = bounded(
            self.service.decrypt(token),
            self.timeouts.reveal,
            cancel,
            AuthStage::Decryption,
        )
        .await??;

        info!(%identity, "attribute revealed");
        Ok(value)
    }
}

/// Await `fut` unless `limit` elapses or `cancel` fires first.
async fn bounded<F: Future>(
    fut: F,
    limit: Duration,
    cancel: &CancelToken,
    stage: AuthStage,
) -> Result<F::Output, AuthError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(AuthError::Cancelled(stage)),
        res = tokio::time::timeout(limit, fut) => match res {
            Ok(out) => Ok(out),
            Err(_elapsed) => Err(AuthError::Timeout {
                stage,
                limit_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            }),
        },
    }
}
