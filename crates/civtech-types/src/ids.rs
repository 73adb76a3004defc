//! Type-safe string identifiers.
//!
//! Civilization ids, technology ids, and owner addresses are all strings
//! on the wire. Wrapping them in distinct newtypes prevents passing a
//! technology id where a civilization id is expected.
//!
//! New civilization ids are UUID v7 strings (time-ordered). Records
//! written by older clients carry ids like `1700000000000-ab12`; those are
//! accepted verbatim since the id is opaque.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`String`] with standard derives.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub String);

        impl $name {
            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the inner string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl core::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id! {
    /// Unique, immutable identifier of a civilization record.
    CivilizationId
}

define_string_id! {
    /// Identifier of a technology in the tech tree (`snake_case`).
    TechId
}

define_string_id! {
    /// Address of the identity that owns a civilization.
    OwnerAddress
}

impl CivilizationId {
    /// Generate a fresh identifier using UUID v7 (time-ordered).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl OwnerAddress {
    /// Compare two addresses ignoring ASCII case.
    ///
    /// Hex addresses are reported in checksummed mixed case by some
    /// signers and in lowercase by others.
    pub fn matches(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}
