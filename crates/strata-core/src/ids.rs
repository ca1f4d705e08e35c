//! Branded ID newtypes for type safety.
//!
//! Every record kind in Strata has a distinct ID type implemented as a
//! newtype wrapper around `String`. This prevents accidentally passing an
//! entity ID where an event ID is expected, and keeps every cross-layer
//! reference a plain stable string (no live pointers between layers).
//!
//! IDs are `<prefix>_<uuid v7>`. UUID v7 is time-ordered, so IDs minted by
//! one process sort in creation order.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Prefix used for freshly minted IDs of this kind.
            pub const PREFIX: &'static str = $prefix;

            /// Create a new ID (`<prefix>_<uuid v7>`).
            #[must_use]
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7()))
            }

            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Unique identifier for an appended event.
    EventId, "evt"
}

branded_id! {
    /// Unique identifier for a resolved entity.
    EntityId, "ent"
}

branded_id! {
    /// Unique identifier for a directed edge between two entities.
    EdgeId, "edg"
}

branded_id! {
    /// Unique identifier for a subject-predicate-object fact.
    FactId, "fct"
}

branded_id! {
    /// Unique identifier for a topic cluster.
    TopicId, "top"
}

branded_id! {
    /// Unique identifier for a learning record.
    LearningId, "lrn"
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_carry_prefix_and_v7() {
        let id = EventId::new();
        let (prefix, uuid) = id.as_str().split_once('_').unwrap();
        assert_eq!(prefix, "evt");
        let parsed = Uuid::parse_str(uuid).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn prefixes_are_distinct() {
        let prefixes = [
            EventId::PREFIX,
            EntityId::PREFIX,
            EdgeId::PREFIX,
            FactId::PREFIX,
            TopicId::PREFIX,
            LearningId::PREFIX,
        ];
        let unique: std::collections::HashSet<_> = prefixes.iter().collect();
        assert_eq!(unique.len(), prefixes.len());
    }

    #[test]
    fn ids_are_unique() {
        let a = EntityId::new();
        let b = EntityId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn ids_minted_later_sort_later() {
        let a = FactId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = FactId::new();
        assert!(a < b);
    }

    #[test]
    fn from_str_ref_and_display() {
        let id = TopicId::from("top_custom");
        assert_eq!(id.as_str(), "top_custom");
        assert_eq!(format!("{id}"), "top_custom");
    }

    #[test]
    fn serde_is_transparent() {
        let id = EventId::from("evt_1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"evt_1\"");
        let back: EventId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn into_inner() {
        let id = LearningId::from("lrn_x");
        assert_eq!(id.into_inner(), "lrn_x");
    }
}
