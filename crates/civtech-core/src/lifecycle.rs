//! Civilization creation, research, and attribute reveal.
//!
//! [`Lifecycle`] orchestrates the cipher, the reveal protocol, the tech
//! tree, and the store. Every operation checks all of its preconditions
//! before the first write, and re-syncs the session directory after a
//! successful one.
//!
//! # Consistency
//!
//! The store offers no transactions and no compare-and-swap.
//!
//! - Creation writes the record, then the index. If the index step fails
//!   the record is deleted again, so no unindexed record is left behind.
//! - Research re-reads the record right before writing and refuses with
//!   [`CoreError::StaleRecord`] if it no longer matches what the session
//!   loaded. A writer landing between that re-read and the write still
//!   wins silently; closing that window needs a conditional write in the
//!   store.
//! - Research rewrites the re-read record, so fields other clients stored
//!   on it are written back untouched.

use civtech_crypto::{
    AttributeCipher, Authorizer, CancelToken, DecryptionService, IdentitySigner,
    LocalDecryptionService, PlaceholderCipher, RevealTimeouts,
};
use civtech_tree::{OrderViolation, TechTree, build_tech_tree, check_eligible, research};
use civtech_types::{
    Civilization, CivilizationId, EncryptedValue, ExtraFields, OwnerAddress, TechId,
};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::config::AuthConfig;
use crate::directory::Directory;
use crate::error::CoreError;
use crate::session::{Session, unix_now};

/// Which encrypted attribute to reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    /// Research points available for spending.
    ResearchPoints,
    /// Military power.
    MilitaryPower,
}

impl Attribute {
    const fn token(self, civ: &Civilization) -> &EncryptedValue {
        match self {
            Self::ResearchPoints => &civ.research_points,
            Self::MilitaryPower => &civ.military_power,
        }
    }
}

/// Result of a successful research request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchOutcome {
    /// The technology that was researched.
    pub tech: TechId,
    /// The record as written.
    pub civilization: Civilization,
    /// Points left after paying the cost.
    pub remaining_points: Decimal,
}

/// Creates and mutates civilizations on behalf of a session.
pub struct Lifecycle<C, D> {
    tree: TechTree,
    cipher: C,
    authorizer: Authorizer<D>,
}

/// Lifecycle over the placeholder cipher and local decryption.
pub type LocalLifecycle = Lifecycle<PlaceholderCipher, LocalDecryptionService<PlaceholderCipher>>;

impl LocalLifecycle {
    /// Build the standard tree with the placeholder cipher, timed by
    /// `auth`.
    pub fn local(auth: &AuthConfig) -> Self {
        let cipher = PlaceholderCipher::new();
        Self::new(
            build_tech_tree(),
            cipher,
            Authorizer::new(
                LocalDecryptionService::new(cipher, auth.reveal_latency()),
                RevealTimeouts {
                    sign: auth.sign_timeout(),
                    reveal: auth.reveal_timeout(),
                },
            ),
        )
    }
}

impl<C: AttributeCipher, D: DecryptionService> Lifecycle<C, D> {
    /// Assemble a lifecycle from its collaborators.
    pub const fn new(tree: TechTree, cipher: C, authorizer: Authorizer<D>) -> Self {
        Self {
            tree,
            cipher,
            authorizer,
        }
    }

    /// The tech tree research is checked against.
    pub const fn tree(&self) -> &TechTree {
        &self.tree
    }

    /// Create a civilization owned by the session's identity.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotConnected`] without a connected identity
    /// - [`CoreError::InvalidName`] if `name` is blank
    /// - [`CoreError::WriteFailed`] or [`CoreError::Timeout`] if a write
    ///   fails; a record written before the failure is removed
    /// - [`CoreError::ParseFailure`] if the existing index is corrupt
    ///
    /// Once both writes succeed the id is returned even if the follow-up
    /// re-sync fails.
    pub async fn create<S: IdentitySigner>(
        &self,
        session: &Session<S>,
        name: &str,
        initial_points: Decimal,
        initial_power: Decimal,
    ) -> Result<CivilizationId, CoreError> {
        let owner = session.identity().ok_or(CoreError::NotConnected)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::InvalidName);
        }

        let civ = Civilization {
            id: CivilizationId::generate(),
            name: name.to_owned(),
            research_points: self.cipher.encrypt(initial_points),
            military_power: self.cipher.encrypt(initial_power),
            discovered_technologies: Vec::new(),
            last_updated: unix_now(),
            owner,
            version: 0,
            extra_fields: ExtraFields::new(),
        };

        let store = session.store();
        store
            .save_record(&civ)
            .await
            .map_err(|e| CoreError::from_write(&civtech_store::record_key(&civ.id), e))?;

        if let Err(e) = self.append_to_index(session, &civ.id).await {
            warn!(civilization_id = %civ.id, error = %e, "index update failed, removing record");
            if let Err(cleanup) = store.delete_record(&civ.id).await {
                error!(
                    civilization_id = %civ.id,
                    error = %cleanup,
                    "failed to remove unindexed record"
                );
            }
            return Err(e);
        }

        info!(
            civilization_id = %civ.id,
            name = %civ.name,
            owner = %civ.owner,
            "civilization created"
        );
        if let Err(e) = session.sync().await {
            warn!(civilization_id = %civ.id, error = %e, "re-sync after create failed");
        }
        Ok(civ.id)
    }

    async fn append_to_index<S: IdentitySigner>(
        &self,
        session: &Session<S>,
        id: &CivilizationId,
    ) -> Result<(), CoreError> {
        let store = session.store();
        let mut ids = store.load_index().await?;
        ids.push(id.clone());
        store
            .save_index(&ids)
            .await
            .map_err(|e| CoreError::from_write(civtech_store::INDEX_KEY, e))
    }

    /// Research `tech_id` for the civilization `civ_id`.
    ///
    /// Eligibility is checked before the identity is asked to sign, and
    /// nothing is written unless every check passes.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotConnected`] without a connected identity
    /// - [`CoreError::CivilizationNotFound`] if `civ_id` is not in the
    ///   session directory, is not owned by the identity, or its record
    ///   has disappeared
    /// - [`CoreError::UnknownTechnology`], [`CoreError::AlreadyDiscovered`],
    ///   [`CoreError::PrerequisiteUnmet`], [`CoreError::InsufficientPoints`]
    /// - [`CoreError::NotAuthorized`] if the reveal is refused
    /// - [`CoreError::StaleRecord`] if the record changed since the last sync
    /// - [`CoreError::Cancelled`] or [`CoreError::Timeout`]
    /// - [`CoreError::WriteFailed`] if the final write fails
    pub async fn research<S: IdentitySigner>(
        &self,
        session: &Session<S>,
        civ_id: &CivilizationId,
        tech_id: &str,
        cancel: &CancelToken,
    ) -> Result<ResearchOutcome, CoreError> {
        let identity = session.identity().ok_or(CoreError::NotConnected)?;
        let held = owned(&*session.directory().await, civ_id, &identity)?.clone();

        check_eligible(&self.tree, tech_id, &held)?;

        let points = self
            .authorizer
            .reveal(
                session.signer(),
                &session.challenge(),
                &held.research_points,
                cancel,
                unix_now(),
            )
            .await?;

        let store = session.store();
        let persisted = store
            .load_record(&held.id)
            .await?
            .filter(|civ| civ.is_owned_by(&identity))
            .ok_or(CoreError::CivilizationNotFound)?;

        if persisted.version != held.version
            || persisted.research_points != held.research_points
            || persisted.discovered_technologies != held.discovered_technologies
        {
            warn!(
                civilization_id = %held.id,
                expected = held.version,
                found = persisted.version,
                "record changed since last sync"
            );
            return Err(CoreError::StaleRecord {
                expected: held.version,
                found: persisted.version,
            });
        }

        let transition = research(
            &self.tree,
            tech_id,
            &persisted,
            points,
            session.is_connected(),
            unix_now(),
        )?;
        let updated = transition.apply(
            &persisted,
            self.cipher.encrypt(transition.remaining_points),
        );

        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        store
            .save_record(&updated)
            .await
            .map_err(|e| CoreError::from_write(&civtech_store::record_key(&updated.id), e))?;

        info!(
            civilization_id = %updated.id,
            tech = %transition.tech,
            version = updated.version,
            "technology researched"
        );
        session.sync().await?;

        Ok(ResearchOutcome {
            tech: transition.tech,
            civilization: updated,
            remaining_points: transition.remaining_points,
        })
    }

    /// Reveal one attribute of the civilization `civ_id`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotConnected`] without a connected identity
    /// - [`CoreError::CivilizationNotFound`] if `civ_id` is not in the
    ///   session directory or is not owned by the identity
    /// - [`CoreError::NotAuthorized`], [`CoreError::Timeout`],
    ///   [`CoreError::Cancelled`], or [`CoreError::ParseFailure`] from the
    ///   reveal
    pub async fn reveal<S: IdentitySigner>(
        &self,
        session: &Session<S>,
        civ_id: &CivilizationId,
        attribute: Attribute,
        cancel: &CancelToken,
    ) -> Result<Decimal, CoreError> {
        let identity = session.identity().ok_or(CoreError::NotConnected)?;
        let directory = session.directory().await;
        let civ = owned(&directory, civ_id, &identity)?;

        let value = self
            .authorizer
            .reveal(
                session.signer(),
                &session.challenge(),
                attribute.token(civ),
                cancel,
                unix_now(),
            )
            .await?;
        Ok(value)
    }

    /// Discovery-order problems in every loaded record.
    ///
    /// A record lists a technology before one of its prerequisites only if
    /// some writer bypassed the research checks.
    pub fn order_violations(&self, directory: &Directory) -> Vec<(CivilizationId, OrderViolation)> {
        directory
            .entries
            .iter()
            .flat_map(|entry| {
                let civ = &entry.civilization;
                self.tree
                    .order_violations(&civ.discovered_technologies)
                    .into_iter()
                    .map(|violation| (civ.id.clone(), violation))
            })
            .collect()
    }
}

/// The directory entry for `id`, if `identity` owns it.
fn owned<'d>(
    directory: &'d Directory,
    id: &CivilizationId,
    identity: &OwnerAddress,
) -> Result<&'d Civilization, CoreError> {
    directory
        .find(id.as_str())
        .map(|entry| &entry.civilization)
        .filter(|civ| civ.is_owned_by(identity))
        .ok_or(CoreError::CivilizationNotFound)
}
