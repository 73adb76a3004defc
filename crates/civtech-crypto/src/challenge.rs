//! The canonical challenge an identity signs before a reveal.
//!
//! Five fields, newline-joined, in fixed order, no trailing newline:
//!
//! ```text
//! publickey:<hex-string>
//! contractAddresses:<store-address>
//! contractsChainId:<integer>
//! startTimestamp:<unix-seconds>
//! durationDays:<integer>
//! ```

use core::fmt;

/// Seconds in one day of challenge validity.
const SECONDS_PER_DAY: i64 = 86_400;

/// A reveal authorization challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Hex-encoded session public key.
    pub public_key: String,
    /// Address of the record store.
    pub contract_address: String,
    /// Active network id.
    pub chain_id: u64,
    /// Unix seconds when the session started.
    pub start_timestamp: i64,
    /// How many days the authorization stays valid.
    pub duration_days: u32,
}

impl Challenge {
    /// The exact message the identity is asked to sign.
    pub fn to_message(&self) -> String {
        self.to_string()
    }

    /// Unix seconds at which the challenge stops being valid.
    pub fn expires_at(&self) -> i64 {
        i64::from(self.duration_days)
            .checked_mul(SECONDS_PER_DAY)
            .and_then(|span| self.start_timestamp.checked_add(span))
            .unwrap_or(i64::MAX)
    }

    /// Whether the validity window has passed at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at()
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "publickey:{}\ncontractAddresses:{}\ncontractsChainId:{}\nstartTimestamp:{}\ndurationDays:{}",
            self.public_key,
            self.contract_address,
            self.chain_id,
            self.start_timestamp,
            self.duration_days
        )
    }
}
