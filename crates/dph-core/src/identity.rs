//! # Identity Newtypes
//!
//! Type-level distinction between user, project and version identifiers,
//! so an owner check can never be handed a project id by mistake.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a registered user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

/// Unique identifier for a hosted project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub Uuid);

/// Unique identifier for one uploaded version of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(pub Uuid);

macro_rules! uuid_newtype {
    ($name:ident, $what:literal) => {
        impl $name {
            #[doc = concat!("Generate a new random ", $what, " identifier.")]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

uuid_newtype!(UserId, "user");
uuid_newtype!(ProjectId, "project");
uuid_newtype!(VersionId, "version");

// ── Role ────────────────────────────────────────────────────────────────────

/// Account roles.
///
/// `Helper` is a community badge with no moderation rights. Only
/// `Moderator` and `Admin` count as staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Default,
    Helper,
    Moderator,
    Admin,
}

/// A role string that is not one of the four known roles.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown role: {0:?}")]
pub struct UnknownRole(pub String);

impl Role {
    /// Whether this role may review, approve, reject and take down projects.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Moderator | Self::Admin)
    }

    /// Return the canonical string representation of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Helper => "helper",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    /// Parse a role name, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "helper" => Ok(Self::Helper),
            "moderator" => Ok(Self::Moderator),
            "admin" => Ok(Self::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

// ── Principal ───────────────────────────────────────────────────────────────

/// The resolved identity of one inbound request.
///
/// Exists only for the duration of a request. Anonymous callers are
/// represented as `Option::<Principal>::None`, never as a sentinel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    /// Whether this principal is the given user.
    pub fn is(&self, user: &UserId) -> bool {
        self.id == *user
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_moderator_and_admin_are_staff() {
        assert!(!Role::Default.is_staff());
        assert!(!Role::Helper.is_staff());
        assert!(Role::Moderator.is_staff());
        assert!(Role::Admin.is_staff());
    }

    #[test]
    fn role_parse_ignores_case() {
        assert_eq!("Moderator".parse::<Role>().unwrap(), Role::Moderator);
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" helper ".parse::<Role>().unwrap(), Role::Helper);
    }

    #[test]
    fn role_parse_rejects_unknown() {
        let err = "owner".parse::<Role>().unwrap_err();
        assert_eq!(err, UnknownRole("owner".to_string()));
    }

    #[test]
    fn role_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Role::Moderator).unwrap(), "\"moderator\"");
        let parsed: Role = serde_json::from_str("\"default\"").unwrap();
        assert_eq!(parsed, Role::Default);
    }

    #[test]
    fn ids_are_distinct_and_transparent() {
        let a = UserId::new();
        let b = UserId::new();
        assert_ne!(a, b);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"{}\"", a.as_uuid()));
    }

    #[test]
    fn principal_identity_check() {
        let id = UserId::new();
        let p = Principal::new(id, Role::Default);
        assert!(p.is(&id));
        assert!(!p.is(&UserId::new()));
    }
}
