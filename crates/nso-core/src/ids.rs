//! Typed server tokens and client-side identifiers.
//!
//! The server hands out several opaque tokens: transaction handles (`th`),
//! query handles (`qh`) and subscription handles. Each gets its own newtype
//! so a query handle can never be passed where a transaction handle is
//! expected. Comet ids and request ids are generated on the client.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix of every client-generated comet id.
pub const COMET_ID_PREFIX: &str = "remote-comet-";

macro_rules! numeric_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw server value.
            #[must_use]
            pub fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// The raw server value.
            #[must_use]
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

macro_rules! string_token {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
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

numeric_handle! {
    /// Transaction handle (`th`) returned by `new_trans`.
    TransactionHandle
}

numeric_handle! {
    /// Query handle (`qh`) returned by `start_query`.
    QueryHandle
}

string_token! {
    /// Handle of one subscription on a comet channel.
    SubscriptionHandle
}

string_token! {
    /// Identifier of a comet channel, chosen by the client.
    CometId
}

impl CometId {
    /// Generate a fresh comet id (`remote-comet-<uuid v7>`).
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{COMET_ID_PREFIX}{}", Uuid::now_v7()))
    }
}

/// Per-session JSON-RPC request id source.
///
/// Ids start at 1 and increase monotonically. Each session owns its own
/// generator, so ids never depend on process-wide state.
#[derive(Debug)]
pub struct RequestIdGenerator {
    next: AtomicU64,
}

impl RequestIdGenerator {
    /// Create a generator whose first id is 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create a generator whose first id is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Take the next id.
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn request_ids_are_monotonic() {
        let ids = RequestIdGenerator::new();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        assert_eq!(ids.next_id(), 3);
    }

    #[test]
    fn generators_are_independent() {
        let a = RequestIdGenerator::new();
        let b = RequestIdGenerator::starting_at(100);
        assert_eq!(a.next_id(), 1);
        assert_eq!(b.next_id(), 100);
        assert_eq!(a.next_id(), 2);
    }

    #[test]
    fn request_ids_unique_across_threads() {
        let ids = Arc::new(RequestIdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..250).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn comet_ids_are_prefixed_and_unique() {
        let a = CometId::generate();
        let b = CometId::generate();
        assert!(a.starts_with(COMET_ID_PREFIX));
        assert_ne!(a, b);
    }

    #[test]
    fn handles_serialize_transparently() {
        let th = TransactionHandle::new(42);
        assert_eq!(serde_json::to_value(th).unwrap(), serde_json::json!(42));

        let h = SubscriptionHandle::from("sub-1");
        assert_eq!(serde_json::to_value(&h).unwrap(), serde_json::json!("sub-1"));
    }

    #[test]
    fn handle_display() {
        assert_eq!(QueryHandle::new(7).to_string(), "7");
        assert_eq!(SubscriptionHandle::from("h").to_string(), "h");
    }
}
