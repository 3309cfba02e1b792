//! Who the current visitor is.

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// The current visitor, as reported by the identity provider.
///
/// The engine never manages login or logout; it only branches on whether a
/// user is present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "user_id", rename_all = "snake_case")]
pub enum Identity {
    /// No signed-in user. The guest ledger is the source of truth.
    #[default]
    Anonymous,
    /// A signed-in user. The remote mirror is the source of truth.
    User(UserId),
}

impl Identity {
    /// Build an identity from a nullable "current user" signal.
    #[must_use]
    pub fn from_optional(user: Option<UserId>) -> Self {
        user.map_or(Self::Anonymous, Self::User)
    }

    /// Returns the signed-in user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&UserId> {
        match self {
            Self::Anonymous => None,
            Self::User(id) => Some(id),
        }
    }

    /// Returns `true` when nobody is signed in.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

impl From<UserId> for Identity {
    fn from(user: UserId) -> Self {
        Self::User(user)
    }
}

impl core::fmt::Display for Identity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Anonymous => f.write_str("anonymous"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}
