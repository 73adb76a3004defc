//! Technology tree and research state machine for civtech.
//!
//! The tree is a fixed directed acyclic graph of [`Technology`] items.
//! A civilization's research state is its discovered list; the only
//! transition is [`research()`], which appends one technology whose
//! prerequisites are all present and charges [`RESEARCH_COST`] points.
//!
//! # Modules
//!
//! - [`tree`] -- [`TechTree`], eligibility, progress, ordering, and the
//!   built-in catalog
//! - [`research`] -- The pure research transition and its errors

pub mod research;
pub mod tree;

pub use research::{ResearchError, ResearchTransition, check_eligible, research};
pub use tree::{
    OrderViolation, RESEARCH_COST, TechProgress, TechStatus, TechTree, Technology, build_tech_tree,
};
