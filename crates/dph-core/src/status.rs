//! # Project Lifecycle Status
//!
//! The closed set of publication states. Inbound status strings are matched
//! case-insensitively and always stored in lower-case canonical form.
//!
//! A stored value outside this enum is a data-integrity fault. Callers that
//! decode persisted rows map [`UnknownStatus`] to their own illegal-state
//! error rather than to a client error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Publication status of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    /// Visible only to the owner. Initial state.
    Draft,
    /// Submitted for review. Visible to the owner and to staff.
    Pending,
    /// Approved and publicly visible.
    Live,
}

/// A status string that is not `draft`, `pending` or `live`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown project status: {0:?}")]
pub struct UnknownStatus(pub String);

impl ProjectStatus {
    /// All states, in lifecycle order.
    pub const ALL: [ProjectStatus; 3] = [Self::Draft, Self::Pending, Self::Live];

    /// Return the canonical (lower-case) string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Live => "live",
        }
    }

    /// Whether the project is publicly visible.
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Live)
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "live" => Ok(Self::Live),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_case() {
        assert_eq!("LIVE".parse::<ProjectStatus>().unwrap(), ProjectStatus::Live);
        assert_eq!("Pending".parse::<ProjectStatus>().unwrap(), ProjectStatus::Pending);
        assert_eq!("draft".parse::<ProjectStatus>().unwrap(), ProjectStatus::Draft);
    }

    #[test]
    fn parse_rejects_unknown_values() {
        assert!("archived".parse::<ProjectStatus>().is_err());
        assert!("".parse::<ProjectStatus>().is_err());
        assert!("live!".parse::<ProjectStatus>().is_err());
    }

    #[test]
    fn display_is_canonical_lower_case() {
        for status in ProjectStatus::ALL {
            let shown = status.to_string();
            assert_eq!(shown, shown.to_ascii_lowercase());
            assert_eq!(shown.parse::<ProjectStatus>().unwrap(), status);
        }
    }

    #[test]
    fn only_live_is_public() {
        assert!(ProjectStatus::Live.is_public());
        assert!(!ProjectStatus::Pending.is_public());
        assert!(!ProjectStatus::Draft.is_public());
    }

    #[test]
    fn serde_uses_lower_case() {
        assert_eq!(serde_json::to_string(&ProjectStatus::Pending).unwrap(), "\"pending\"");
    }
}
