//! Typed identifiers for agents, sessions, traces, spans, and workflows.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Plain opaque identifiers: no ordering requirement, just uniqueness
/// and "don't mix up an `AgentId` with a `WorkflowId`" type safety.
macro_rules! opaque_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new typed ID from anything that converts to `String`.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

opaque_id!(AgentId, "Identifier for a configured agent.");
opaque_id!(WorkflowId, "Identifier for a workflow definition.");

/// Time-ordered identifiers backed by UUIDv7. Generating one always
/// succeeds and sorts monotonically with wall-clock creation order, which
/// is what session, trace, and span ordering relies on (spec §3).
macro_rules! ordered_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new, time-ordered identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Wrap an existing UUID without checking its version.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// The underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

ordered_id!(
    SessionId,
    "Time-ordered session identifier; unique across the process (spec §3)."
);
ordered_id!(TraceId, "Time-ordered identifier for a `Trace`.");
ordered_id!(SpanId, "Time-ordered identifier for a `Span`.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_ids_round_trip_through_string() {
        let a = AgentId::new("assistant-1");
        assert_eq!(a.as_str(), "assistant-1");
        assert_eq!(a.to_string(), "assistant-1");
        assert_eq!(AgentId::from("assistant-1"), a);
    }

    #[test]
    fn session_ids_are_monotonically_ordered() {
        let first = SessionId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = SessionId::new();
        assert!(
            first < second,
            "UUIDv7 ids must sort by creation order once timestamps differ"
        );
    }

    #[test]
    fn session_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| SessionId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }
}

#[cfg(test)]
mod ordering_properties {
    use super::*;
    use proptest::prelude::*;
    use uuid::{NoContext, Timestamp};

    fn v7_at_millis(millis: u64) -> Uuid {
        let timestamp = Timestamp::from_unix(NoContext, millis / 1000, ((millis % 1000) * 1_000_000) as u32);
        Uuid::new_v7(timestamp)
    }

    proptest! {
        // UUIDv7 packs the millisecond timestamp into its high-order bits,
        // so two ids with distinct millisecond timestamps must order the
        // same way as those timestamps regardless of the random bits below
        // them (spec §3's "sorts monotonically with wall-clock creation
        // order").
        #[test]
        fn ordering_follows_millisecond_timestamp(
            millis_a in 0u64..4_102_444_800_000,
            millis_b in 0u64..4_102_444_800_000,
        ) {
            let a = SessionId::from_uuid(v7_at_millis(millis_a));
            let b = SessionId::from_uuid(v7_at_millis(millis_b));
            match millis_a.cmp(&millis_b) {
                std::cmp::Ordering::Less => prop_assert!(a < b),
                std::cmp::Ordering::Greater => prop_assert!(a > b),
                std::cmp::Ordering::Equal => {}
            }
        }
    }
}
