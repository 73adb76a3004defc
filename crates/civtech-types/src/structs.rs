//! Core record structs: [`Civilization`] and its [`EncryptedValue`] attributes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{CivilizationId, OwnerAddress, TechId};

/// Record fields this client does not interpret, keyed by wire name.
pub type ExtraFields = serde_json::Map<String, serde_json::Value>;

/// An opaque token standing in for an encrypted numeric attribute.
///
/// Only the attribute cipher knows how to produce or read one. Callers
/// treat the contents as a black box.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EncryptedValue(pub String);

impl EncryptedValue {
    /// Borrow the raw token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for EncryptedValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EncryptedValue {
    fn from(token: &str) -> Self {
        Self(token.to_owned())
    }
}

/// A persisted civilization record.
///
/// Created once by its owner and afterwards mutated only by research
/// transitions. Records are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Civilization {
    /// Unique, immutable identifier.
    pub id: CivilizationId,
    /// Display name chosen at creation.
    pub name: String,
    /// Encrypted research points available for spending.
    pub research_points: EncryptedValue,
    /// Encrypted military power.
    pub military_power: EncryptedValue,
    /// Discovered technologies in the order they were researched.
    pub discovered_technologies: Vec<TechId>,
    /// Unix seconds of the last create or research write.
    pub last_updated: i64,
    /// Identity that created the record.
    pub owner: OwnerAddress,
    /// Optimistic concurrency counter, bumped on every research write.
    ///
    /// Records written before versioning existed read back as `0`.
    pub version: u64,
    /// Fields written by other clients, carried through rewrites
    /// unchanged.
    #[serde(default, skip_serializing_if = "ExtraFields::is_empty")]
    #[ts(skip)]
    pub extra_fields: ExtraFields,
}

impl Civilization {
    /// Whether the given technology has already been discovered.
    pub fn has_discovered(&self, tech: &str) -> bool {
        self.discovered_technologies.iter().any(|t| t.as_str() == tech)
    }

    /// Whether `identity` owns this civilization.
    pub fn is_owned_by(&self, identity: &OwnerAddress) -> bool {
        self.owner.matches(identity)
    }

    /// `last_updated` as a UTC timestamp, if it is in range.
    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.last_updated, 0)
    }
}
