//! Wire format for civilization records and the directory index.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `civilization_keys` | JSON array | Every civilization id ever created |
//! | `civilization_{id}` | JSON object | One civilization record |
//!
//! Records use the camelCase field names written by earlier clients:
//!
//! ```json
//! {"name":"Roma","techPoints":"FHE-MjUw","militaryPower":"FHE-MTA=",
//!  "discoveredTechnologies":["agriculture"],"lastUpdated":1700000000,
//!  "owner":"0xP","version":3}
//! ```
//!
//! The id is not part of the payload; it is the key suffix. `version` is
//! optional and absent from legacy records. Attribute tokens written as
//! bare JSON numbers by very old clients are read back as their decimal
//! text. Fields this client does not know are kept on the record and
//! written back as they were.

use civtech_types::{
    Civilization, CivilizationId, EncryptedValue, ExtraFields, OwnerAddress, TechId,
};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Key holding the JSON array of every civilization id.
pub const INDEX_KEY: &str = "civilization_keys";

/// Prefix of every record key.
pub const RECORD_KEY_PREFIX: &str = "civilization_";

/// The store key for a civilization record.
pub fn record_key(id: &CivilizationId) -> String {
    format!("{RECORD_KEY_PREFIX}{id}")
}

/// On-the-wire record shape.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRecord {
    name: String,
    tech_points: WireToken,
    military_power: WireToken,
    #[serde(default)]
    discovered_technologies: Vec<String>,
    last_updated: i64,
    owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<u64>,
    #[serde(flatten)]
    extra: ExtraFields,
}

/// An attribute token as it may appear on the wire.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum WireToken {
    Text(String),
    Number(serde_json::Number),
}

impl From<WireToken> for EncryptedValue {
    fn from(token: WireToken) -> Self {
        match token {
            WireToken::Text(s) => Self(s),
            WireToken::Number(n) => Self(n.to_string()),
        }
    }
}

/// Serialize a record to its wire bytes.
///
/// # Errors
///
/// Returns [`DecodeError::Json`] if serialization fails.
pub fn encode_record(civ: &Civilization) -> Result<Vec<u8>, DecodeError> {
    let wire = WireRecord {
        name: civ.name.clone(),
        tech_points: WireToken::Text(civ.research_points.0.clone()),
        military_power: WireToken::Text(civ.military_power.0.clone()),
        discovered_technologies: civ
            .discovered_technologies
            .iter()
            .map(|t| t.as_str().to_owned())
            .collect(),
        last_updated: civ.last_updated,
        owner: civ.owner.as_str().to_owned(),
        version: Some(civ.version),
        extra: civ.extra_fields.clone(),
    };
    Ok(serde_json::to_vec(&wire)?)
}

/// Parse a record stored under `id`.
///
/// # Errors
///
/// Returns [`DecodeError::Json`] if the bytes are not a record.
pub fn decode_record(id: &CivilizationId, bytes: &[u8]) -> Result<Civilization, DecodeError> {
    let wire: WireRecord = serde_json::from_slice(bytes)?;
    Ok(Civilization {
        id: id.clone(),
        name: wire.name,
        research_points: wire.tech_points.into(),
        military_power: wire.military_power.into(),
        discovered_technologies: wire
            .discovered_technologies
            .into_iter()
            .map(TechId::from)
            .collect(),
        last_updated: wire.last_updated,
        owner: OwnerAddress::from(wire.owner),
        version: wire.version.unwrap_or(0),
        extra_fields: wire.extra,
    })
}

/// Serialize the id index.
///
/// # Errors
///
/// Returns [`DecodeError::Json`] if serialization fails.
pub fn encode_index(ids: &[CivilizationId]) -> Result<Vec<u8>, DecodeError> {
    Ok(serde_json::to_vec(ids)?)
}

/// Parse the id index.
///
/// Empty, whitespace-only, and `null` payloads are an empty index.
///
/// # Errors
///
/// Returns [`DecodeError::Json`] if the payload is not a JSON array of
/// strings.
pub fn decode_index(bytes: &[u8]) -> Result<Vec<CivilizationId>, DecodeError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let ids: Option<Vec<CivilizationId>> = serde_json::from_slice(bytes)?;
    Ok(ids.unwrap_or_default())
}
