// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Opaque, newtype identifiers.
//!
//! Agent ids are kind-prefixed random tokens (`coding-a1b2c3d4`) per the
//! spawn algorithm; task and queue-entry ids are plain random tokens. All
//! wrap a `String` and compare/hash/display like one.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

const RANDOM_SUFFIX_LEN: usize = 8;
const RANDOM_ID_LEN: usize = 21;

/// Lowercase alphanumeric alphabet used for random suffixes, so ids are
/// safe to embed in branch names, container names, and file paths.
const ID_ALPHABET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Define a newtype id wrapper around `String`.
///
/// Generates `random()`, `with_prefix(prefix)`, `as_str()`, `Display`,
/// `From<String>`/`From<&str>`, `PartialEq<str>`, and `Borrow<str>`.
macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// A fresh random id with no prefix (e.g. task / queue-entry ids).
            pub fn random() -> Self {
                Self(nanoid::nanoid!(RANDOM_ID_LEN, &$crate::id::ID_ALPHABET))
            }

            /// A fresh random id of the form `{prefix}-{random8}`, per the
            /// ALM spawn algorithm's `id = <kind>-<random8>`.
            pub fn with_prefix(prefix: &str) -> Self {
                let suffix = nanoid::nanoid!($crate::id::RANDOM_SUFFIX_LEN, &$crate::id::ID_ALPHABET);
                Self(format!("{prefix}-{suffix}"))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            /// An empty placeholder, never a valid id — only exists so
            /// structs embedding this id can derive `Default` for partial
            /// test fixtures.
            fn default() -> Self {
                Self(String::new())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(AgentId);
define_id!(TaskId);
define_id!(QueueEntryId);
define_id!(EventId);

impl EventId {
    /// Events use full UUIDs (spec.md §3: "id (UUID)"), not the short
    /// random-token scheme the other entities use.
    pub fn new_uuid() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// First 8 characters, used both in the spool filename and as the
    /// short-prefix the public interface accepts for lookups.
    pub fn short(&self) -> &str {
        let n = self.0.len().min(8);
        &self.0[..n]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_id_has_kind_prefix() {
        let id = AgentId::with_prefix("coding");
        assert!(id.as_str().starts_with("coding-"));
        assert_eq!(id.as_str().len(), "coding-".len() + RANDOM_SUFFIX_LEN);
    }

    #[test]
    fn random_ids_are_unique() {
        let a = TaskId::random();
        let b = TaskId::random();
        assert_ne!(a, b);
    }

    #[test]
    fn event_id_short_is_stable_prefix() {
        let id = EventId::new_uuid();
        assert_eq!(id.short(), &id.as_str()[..8]);
    }
}
