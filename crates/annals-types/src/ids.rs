//! Type-safe identifier wrappers.
//!
//! Event and avatar identifiers are opaque strings assigned by the
//! simulation (usually UUIDs, but legacy saves may carry anything), so the
//! wrappers are string-backed rather than [`Uuid`]-backed. Strong types
//! still prevent passing an avatar id where an event id is expected.
//!
//! [`SessionId`] is different: it names files on disk, so it is validated
//! on construction.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Maximum length of a session identifier, in characters.
pub const MAX_SESSION_ID_LEN: usize = 50;

/// Generates a newtype wrapper around [`String`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[serde(transparent)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier string.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the inner [`String`] value.
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
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Globally unique identifier of a narrative event.
    EventId
}

define_id! {
    /// Identifier of an avatar (character) that can participate in events.
    AvatarId
}

impl EventId {
    /// Generate a fresh identifier using UUID v7 (time-ordered).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Derive a deterministic identifier from a namespace and a key.
    ///
    /// The same inputs always produce the same id (UUID v5), which lets
    /// repeated imports of identical data collide on the primary key.
    pub fn derive(namespace: &Uuid, key: &str) -> Self {
        Self(Uuid::new_v5(namespace, key.as_bytes()).to_string())
    }
}

/// Identity of one save slot. Each session owns exactly one event store.
///
/// Only ASCII letters, digits, `_` and `-` are accepted, up to
/// [`MAX_SESSION_ID_LEN`] characters, because the identifier is embedded
/// in file names next to the world-state snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, TS)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct SessionId(String);

/// Rejection reason for a malformed [`SessionId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidSessionId {
    /// The identifier was empty.
    Empty,
    /// The identifier exceeded [`MAX_SESSION_ID_LEN`] characters.
    TooLong(usize),
    /// The identifier contained a character outside `[A-Za-z0-9_-]`.
    ForbiddenChar(char),
}

impl core::fmt::Display for InvalidSessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Empty => f.write_str("session id is empty"),
            Self::TooLong(len) => write!(
                f,
                "session id is {len} characters long (max {MAX_SESSION_ID_LEN})"
            ),
            Self::ForbiddenChar(c) => write!(f, "session id contains forbidden character {c:?}"),
        }
    }
}

impl std::error::Error for InvalidSessionId {}

const fn is_session_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

impl SessionId {
    /// Validate and wrap a session identifier.
    pub fn parse(raw: &str) -> Result<Self, InvalidSessionId> {
        if raw.is_empty() {
            return Err(InvalidSessionId::Empty);
        }
        let len = raw.chars().count();
        if len > MAX_SESSION_ID_LEN {
            return Err(InvalidSessionId::TooLong(len));
        }
        if let Some(bad) = raw.chars().find(|c| !is_session_char(*c)) {
            return Err(InvalidSessionId::ForbiddenChar(bad));
        }
        Ok(Self(raw.to_owned()))
    }

    /// Turn an arbitrary user-supplied save name into a valid identifier.
    ///
    /// Path separators and other characters that are illegal in file
    /// names are dropped, any remaining unsupported character becomes
    /// `_`, and the result is truncated. An empty result becomes `save`.
    pub fn sanitize(raw: &str) -> Self {
        let cleaned: String = raw
            .chars()
            .filter(|c| !matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
            .map(|c| if is_session_char(c) { c } else { '_' })
            .take(MAX_SESSION_ID_LEN)
            .collect();
        if cleaned.is_empty() {
            Self("save".to_owned())
        } else {
            Self(cleaned)
        }
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::str::FromStr for SessionId {
    type Err = InvalidSessionId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_event_ids_are_unique() {
        let a = EventId::generate();
        let b = EventId::generate();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn derived_event_ids_are_deterministic() {
        let ns = Uuid::nil();
        assert_eq!(EventId::derive(&ns, "0:12:hello"), EventId::derive(&ns, "0:12:hello"));
        assert_ne!(EventId::derive(&ns, "0:12:hello"), EventId::derive(&ns, "1:12:hello"));
    }

    #[test]
    fn id_serializes_as_plain_string() {
        let id = AvatarId::new("avatar-7");
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json.as_deref(), Some("\"avatar-7\""));
        let restored: Result<AvatarId, _> = serde_json::from_str("\"avatar-7\"");
        assert_eq!(restored.ok(), Some(id));
    }

    #[test]
    fn session_id_rejects_path_tricks() {
        assert_eq!(SessionId::parse(""), Err(InvalidSessionId::Empty));
        assert_eq!(
            SessionId::parse("../etc"),
            Err(InvalidSessionId::ForbiddenChar('.'))
        );
        assert!(SessionId::parse("save_20260105_1423").is_ok());
        let long = "x".repeat(MAX_SESSION_ID_LEN + 1);
        assert!(matches!(
            SessionId::parse(&long),
            Err(InvalidSessionId::TooLong(_))
        ));
    }

    #[test]
    fn sanitize_produces_valid_ids() {
        assert_eq!(SessionId::sanitize("my/save:1").as_str(), "mysave1");
        assert_eq!(SessionId::sanitize("hello world").as_str(), "hello_world");
        assert_eq!(SessionId::sanitize("???").as_str(), "save");
        let sanitized = SessionId::sanitize(&"y".repeat(80));
        assert_eq!(sanitized.as_str().len(), MAX_SESSION_ID_LEN);
        assert!(SessionId::parse(sanitized.as_str()).is_ok());
    }
}
