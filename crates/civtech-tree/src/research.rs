//! Research state transition.
//!
//! [`research`] is a pure function: it inspects a civilization, the
//! decrypted research points, and the authorization context, and either
//! rejects the request or returns the [`ResearchTransition`] the caller
//! should persist. The input record is never touched, so a rejected
//! request leaves nothing to roll back.
//!
//! Checks run in a fixed order: connection, known technology, already
//! discovered, prerequisites, points.

use civtech_types::{Civilization, EncryptedValue, TechId};
use rust_decimal::Decimal;
use tracing::debug;

use crate::tree::{TechTree, Technology};

/// Reasons a research request is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResearchError {
    /// No authorized identity is connected.
    #[error("no connected identity to authorize research")]
    NotConnected,

    /// The technology id is not part of the tree.
    #[error("technology not found: {0}")]
    UnknownTechnology(TechId),

    /// The technology is already in the discovered set.
    #[error("technology already discovered: {0}")]
    AlreadyDiscovered(TechId),

    /// At least one prerequisite has not been discovered.
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
}

/// The state change produced by a successful research request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchTransition {
    /// The technology that was researched.
    pub tech: TechId,
    /// The discovered list with `tech` appended.
    pub discovered: Vec<TechId>,
    /// Points left after paying the cost.
    pub remaining_points: Decimal,
    /// Timestamp to record as `last_updated`.
    pub last_updated: i64,
}

impl ResearchTransition {
    /// Produce the updated record.
    ///
    /// `research_points` is the re-encrypted `remaining_points`; the
    /// version counter is bumped so concurrent writers can detect the
    /// change.
    pub fn apply(&self, civ: &Civilization, research_points: EncryptedValue) -> Civilization {
        Civilization {
            research_points,
            discovered_technologies: self.discovered.clone(),
            last_updated: self.last_updated,
            version: civ.version.saturating_add(1),
            ..civ.clone()
        }
    }
}

/// Validate a research request and compute the resulting transition.
///
/// `connected` reports whether an authorized identity context exists.
/// `now` is the unix timestamp recorded on success.
///
/// # Errors
///
/// Returns the first failing [`ResearchError`] in check order.
pub fn research(
    tree: &TechTree,
    tech_id: &str,
    civ: &Civilization,
    decrypted_points: Decimal,
    connected: bool,
    now: i64,
) -> Result<ResearchTransition, ResearchError> {
    if !connected {
        return Err(ResearchError::NotConnected);
    }

    let tech = check_eligible(tree, tech_id, civ)?;

    let remaining_points = decrypted_points
        .checked_sub(tech.cost)
        .filter(|remaining| *remaining >= Decimal::ZERO)
        .ok_or(ResearchError::InsufficientPoints {
            available: decrypted_points,
            required: tech.cost,
        })?;

    let mut discovered = civ.discovered_technologies.clone();
    discovered.push(tech.id.clone());

    debug!(
        civilization = %civ.id,
        tech = %tech.id,
        remaining = %remaining_points,
        "research transition computed"
    );

    Ok(ResearchTransition {
        tech: tech.id.clone(),
        discovered,
        remaining_points,
        last_updated: now,
    })
}

/// Check everything about a request that does not need decrypted points.
///
/// Lets callers reject ineligible requests before asking the identity to
/// sign anything.
///
/// # Errors
///
/// Returns [`ResearchError::UnknownTechnology`],
/// [`ResearchError::AlreadyDiscovered`], or
/// [`ResearchError::PrerequisiteUnmet`].
pub fn check_eligible<'t>(
    tree: &'t TechTree,
    tech_id: &str,
    civ: &Civilization,
) -> Result<&'t Technology, ResearchError> {
    let tech = tree
        .get(tech_id)
        .ok_or_else(|| ResearchError::UnknownTechnology(TechId::from(tech_id)))?;

    if civ.has_discovered(tech_id) {
        return Err(ResearchError::AlreadyDiscovered(tech.id.clone()));
    }

    if !TechTree::is_eligible(tech, &civ.discovered_technologies) {
        return Err(ResearchError::PrerequisiteUnmet {
            tech: tech.id.clone(),
            missing: TechTree::missing_prerequisites(tech, &civ.discovered_technologies),
        });
    }

    Ok(tech)
}
