//! Basic type definitions for the chat server
//!
//! Provides newtype wrappers and the role ladder:
//! - `ClientId`: UUID-based identifier for a connection
//! - `RoomName`: name of a discussion room
//! - `Role`: per-room permission tier

use std::borrow::Borrow;
use std::fmt;

use uuid::Uuid;

/// Unique client identifier (newtype pattern)
///
/// Wraps a UUID v4 so that a connection can be addressed before it has
/// claimed a handle. Implements Hash and Eq for use as HashMap keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Create a new random client ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room name
///
/// Room names are case-sensitive and compared byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomName(pub String);

impl RoomName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RoomName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Permission tier inside a single room
///
/// Variants are declared in ascending order so the derived `Ord`
/// gives `User < Moderator < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    /// Marker printed in front of a handle in chat lines and listings
    pub fn prefix(self) -> &'static str {
        match self {
            Role::User => "",
            Role::Moderator => "@",
            Role::Admin => "&",
        }
    }

    /// Next tier up, if any
    pub fn next(self) -> Option<Role> {
        match self {
            Role::User => Some(Role::Moderator),
            Role::Moderator => Some(Role::Admin),
            Role::Admin => None,
        }
    }

    /// Whether this role satisfies `required`
    pub fn allows(self, required: Role) -> bool {
        required <= self
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        };
        f.write_str(name)
    }
}
