//! The technology tree: a fixed prerequisite DAG.
//!
//! Every [`Technology`] lists zero or more prerequisite ids. A civilization
//! may research a technology only once every prerequisite is already in
//! its discovered set. The tree is built once via [`build_tech_tree`] and
//! never mutated afterwards.

use std::collections::{BTreeMap, BTreeSet};

use civtech_types::TechId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Research points consumed by every technology.
pub const RESEARCH_COST: Decimal = Decimal::ONE_HUNDRED;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A single researchable technology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technology {
    /// Unique identifier (`snake_case`).
    pub id: TechId,
    /// Human-readable display name.
    pub name: String,
    /// Ids that must be discovered before this can be researched.
    pub prerequisites: Vec<TechId>,
    /// What the technology does for the civilization.
    pub description: String,
    /// Research points consumed on discovery.
    pub cost: Decimal,
}

/// Where a technology stands relative to a discovered set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TechStatus {
    /// Already discovered.
    Researched,
    /// Not discovered, every prerequisite met.
    Available,
    /// Not discovered, at least one prerequisite missing.
    Locked,
}

/// Research progress across the whole tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechProgress {
    /// Distinct technologies of this tree that have been discovered.
    pub researched: usize,
    /// Technologies in the tree.
    pub total: usize,
    /// `researched / total` as a percentage, rounded half up.
    pub percent: usize,
}

/// A discovered technology that appears before one of its prerequisites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderViolation {
    /// The technology recorded too early.
    pub tech: TechId,
    /// The prerequisite that was not yet discovered at that point.
    pub prerequisite: TechId,
}

/// The complete, immutable technology tree.
#[derive(Debug, Clone)]
pub struct TechTree {
    techs: BTreeMap<TechId, Technology>,
}

// ---------------------------------------------------------------------------
// TechTree implementation
// ---------------------------------------------------------------------------

impl TechTree {
    /// Create a tree from a list of technologies.
    ///
    /// Duplicates are silently overwritten (last wins).
    pub fn new(techs: Vec<Technology>) -> Self {
        let mut map = BTreeMap::new();
        for tech in techs {
            map.insert(tech.id.clone(), tech);
        }
        Self { techs: map }
    }

    /// Look up a technology by id.
    pub fn get(&self, id: &str) -> Option<&Technology> {
        self.techs.get(id)
    }

    /// Whether the tree contains the given id.
    pub fn contains(&self, id: &str) -> bool {
        self.techs.contains_key(id)
    }

    /// Number of technologies in the tree.
    pub fn len(&self) -> usize {
        self.techs.len()
    }

    /// Whether the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.techs.is_empty()
    }

    /// Iterate over all technologies ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Technology> {
        self.techs.values()
    }

    /// Whether every prerequisite of `tech` is in `discovered`.
    ///
    /// A technology without prerequisites is always eligible.
    pub fn is_eligible(tech: &Technology, discovered: &[TechId]) -> bool {
        tech.prerequisites.iter().all(|req| discovered.contains(req))
    }

    /// Prerequisites of `tech` missing from `discovered`, in declared order.
    pub fn missing_prerequisites(tech: &Technology, discovered: &[TechId]) -> Vec<TechId> {
        tech.prerequisites
            .iter()
            .filter(|req| !discovered.contains(req))
            .cloned()
            .collect()
    }

    /// Classify a technology against a discovered set.
    pub fn status(tech: &Technology, discovered: &[TechId]) -> TechStatus {
        if discovered.contains(&tech.id) {
            TechStatus::Researched
        } else if Self::is_eligible(tech, discovered) {
            TechStatus::Available
        } else {
            TechStatus::Locked
        }
    }

    /// Technologies not yet discovered whose prerequisites are all met.
    pub fn candidates(&self, discovered: &[TechId]) -> Vec<&Technology> {
        self.techs
            .values()
            .filter(|tech| Self::status(tech, discovered) == TechStatus::Available)
            .collect()
    }

    /// Research progress for a discovered set.
    ///
    /// Only ids present in this tree are counted, and each only once.
    pub fn progress(&self, discovered: &[TechId]) -> TechProgress {
        let researched = discovered
            .iter()
            .filter(|id| self.techs.contains_key(*id))
            .collect::<BTreeSet<_>>()
            .len();
        let total = self.techs.len();
        let percent = researched
            .checked_mul(100)
            .and_then(|scaled| scaled.checked_add(total / 2))
            .and_then(|scaled| scaled.checked_div(total))
            .unwrap_or(0);
        TechProgress {
            researched,
            total,
            percent,
        }
    }

    /// Discovered technologies recorded before one of their prerequisites.
    ///
    /// An empty result means the list respects the tree's topological
    /// order. Ids unknown to the tree are ignored.
    pub fn order_violations(&self, discovered: &[TechId]) -> Vec<OrderViolation> {
        let mut seen: BTreeSet<&TechId> = BTreeSet::new();
        let mut violations = Vec::new();
        for id in discovered {
            if let Some(tech) = self.techs.get(id) {
                for req in &tech.prerequisites {
                    if !seen.contains(req) {
                        violations.push(OrderViolation {
                            tech: id.clone(),
                            prerequisite: req.clone(),
                        });
                    }
                }
            }
            seen.insert(id);
        }
        violations
    }

    /// All technologies ordered so that each prerequisite precedes its
    /// dependents. Among technologies whose prerequisites are all placed,
    /// the smallest id comes first.
    ///
    /// Technologies on a cycle (only possible for an invalid tree) are
    /// omitted.
    pub fn topological_order(&self) -> Vec<&Technology> {
        let (mut in_degree, adjacency) = self.graph();

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut ordered = Vec::with_capacity(self.techs.len());
        while let Some(node) = ready.pop_first() {
            if let Some(tech) = self.techs.get(node) {
                ordered.push(tech);
            }
            if let Some(neighbors) = adjacency.get(node) {
                for &neighbor in neighbors {
                    if let Some(degree) = in_degree.get_mut(neighbor) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            ready.insert(neighbor);
                        }
                    }
                }
            }
        }
        ordered
    }

    /// Validate that the tree forms a DAG and every prerequisite exists.
    ///
    /// Returns a list of error messages. An empty list means the tree
    /// is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for tech in self.techs.values() {
            for req in &tech.prerequisites {
                if !self.techs.contains_key(req) {
                    errors.push(format!(
                        "Technology '{}' requires '{}' which does not exist in the tree",
                        tech.id, req
                    ));
                }
            }
            if tech.prerequisites.contains(&tech.id) {
                errors.push(format!("Technology '{}' lists itself as a prerequisite", tech.id));
            }
        }

        if self.topological_order().len() != self.techs.len() {
            errors.push(String::from(
                "Cycle detected in the tech tree -- topological sort could not visit all nodes",
            ));
        }

        errors
    }

    /// In-degree and prerequisite -> dependents adjacency for Kahn's algorithm.
    fn graph(&self) -> (BTreeMap<&str, usize>, BTreeMap<&str, Vec<&str>>) {
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for tech in self.techs.values() {
            in_degree.entry(tech.id.as_str()).or_insert(0);
            for req in &tech.prerequisites {
                if self.techs.contains_key(req) {
                    adjacency.entry(req.as_str()).or_default().push(tech.id.as_str());
                    let entry = in_degree.entry(tech.id.as_str()).or_insert(0);
                    *entry = entry.saturating_add(1);
                }
            }
        }
        (in_degree, adjacency)
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Create a technology with the standard research cost.
fn tech(id: &str, name: &str, prerequisites: &[&str], description: &str) -> Technology {
    Technology {
        id: TechId::from(id),
        name: String::from(name),
        prerequisites: prerequisites.iter().map(|s| TechId::from(*s)).collect(),
        description: String::from(description),
        cost: RESEARCH_COST,
    }
}

/// The technologies of the game, in catalog order.
fn catalog() -> Vec<Technology> {
    vec![
        tech("agriculture", "Agriculture", &[], "Increase food production by 20%"),
        tech("metallurgy", "Metallurgy", &["mining"], "Unlocks advanced metal tools and weapons"),
        tech("mining", "Mining", &[], "Enables resource extraction from mountains"),
        tech("writing", "Writing", &[], "Enables diplomacy and record keeping"),
        tech("mathematics", "Mathematics", &["writing"], "Improves all research by 15%"),
        tech(
            "military_tactics",
            "Military Tactics",
            &["writing"],
            "Increases combat effectiveness",
        ),
        tech("architecture", "Architecture", &["mathematics"], "Enables wonder construction"),
        tech("naval_warfare", "Naval Warfare", &["shipbuilding"], "Unlocks advanced naval units"),
        tech("shipbuilding", "Shipbuilding", &["woodworking"], "Enables ocean exploration"),
        tech("woodworking", "Woodworking", &[], "Basic construction technology"),
        tech("mysticism", "Mysticism", &[], "Unlocks religious buildings"),
        tech("currency", "Currency", &["mathematics"], "Increases trade income"),
        tech("engineering", "Engineering", &["architecture"], "Enables siege weapons"),
        tech("philosophy", "Philosophy", &["writing"], "Increases research speed"),
        tech("iron_working", "Iron Working", &["metallurgy"], "Unlocks iron weapons and armor"),
    ]
}

/// Build the complete tech tree.
///
/// The tree is guaranteed to be a valid DAG with no missing
/// prerequisites.
pub fn build_tech_tree() -> TechTree {
    TechTree::new(catalog())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
