//! Shared type definitions for civtech.
//!
//! This crate is the single source of truth for the civilization record
//! and its identifiers. Types flow downstream to `TypeScript` via `ts-rs`
//! for whatever front end renders the directory.
//!
//! # Modules
//!
//! - [`ids`] -- String newtypes for civilization, technology, and owner ids
//! - [`structs`] -- The [`Civilization`] record and [`EncryptedValue`] tokens

pub mod ids;
pub mod structs;

pub use ids::{CivilizationId, OwnerAddress, TechId};
pub use structs::{Civilization, EncryptedValue, ExtraFields};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        use ts_rs::TS;

        let _ = crate::ids::CivilizationId::export_all();
        let _ = crate::ids::TechId::export_all();
        let _ = crate::ids::OwnerAddress::export_all();
        let _ = crate::structs::EncryptedValue::export_all();
        let _ = crate::structs::Civilization::export_all();
    }
}
