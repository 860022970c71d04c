//! Identifier newtypes
//!
//! Widget and source ids come from the outside world (widget catalog,
//! configuration UI) and are kept as strings. Task and session ids are
//! generated locally and use ULIDs.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use ulid::Ulid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from anything string-like
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow as `&str`
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True if the id is empty or whitespace
            #[inline]
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Widget identifier
    ComponentId
}

string_id! {
    /// Data source definition identifier, unique within one widget
    SourceId
}

/// Polling task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Ulid);

impl TaskId {
    /// Generate new task ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Edit session identifier
///
/// Every user edit or pipeline run starts a session; configuration writes
/// caused by interactions carry the session of the run that caused them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Ulid);

impl SessionId {
    /// Generate new session ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn string_ids_serialize_transparently() {
        let id = ComponentId::from("chart-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"chart-1\"");
        let back: ComponentId = serde_json::from_str("\"chart-1\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(SourceId::from("temp"), 1);
        assert_eq!(map.get("temp"), Some(&1));
    }

    #[test]
    fn blank_detection() {
        assert!(ComponentId::from("  ").is_blank());
        assert!(!ComponentId::from("w").is_blank());
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
