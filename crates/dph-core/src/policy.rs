//! # Ownership & Role Policy
//!
//! A single pure decision function consulted by every read and mutation
//! entry point. Handlers and stores never inspect roles or compare owner
//! ids themselves; they call [`decide`] and act on the [`Decision`].
//!
//! ## Rules (evaluated in order)
//!
//! | Operation          | Status            | Outcome                                           |
//! |--------------------|-------------------|---------------------------------------------------|
//! | `Read`             | `live`            | allow, with or without a principal                |
//! | `Read`             | `draft`/`pending` | owner allowed; staff allowed on `pending` only    |
//! | `OwnerMutation`    | any               | owner only                                        |
//! | `StaffAction`      | any               | `moderator` or `admin` only                       |
//!
//! Every non-public operation requires a principal. Its absence yields
//! [`Decision::UnauthorizedNoPrincipal`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::{Principal, UserId};
use crate::status::ProjectStatus;

/// The class of operation being attempted on a project or its versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Fetch the project, list or fetch its versions, or download a file.
    Read,
    /// Content edit, publish, withdraw, unpublish, delete, version creation.
    OwnerMutation,
    /// Review queue, approve, reject, takedown, feature.
    StaffAction,
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    ForbiddenNotOwner,
    ForbiddenRole,
    UnauthorizedNoPrincipal,
}

/// A denied policy evaluation, as an error value.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    /// Caller is authenticated but does not own the resource.
    #[error("caller is not the owner of this project")]
    ForbiddenNotOwner,

    /// Caller lacks the moderator or admin role.
    #[error("this action requires a moderator or admin role")]
    ForbiddenRole,

    /// Operation requires authentication and none was presented.
    #[error("authentication required")]
    UnauthorizedNoPrincipal,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Convert to a `Result`, so callers can use `?`.
    pub fn into_result(self) -> Result<(), AccessError> {
        match self {
            Self::Allow => Ok(()),
            Self::ForbiddenNotOwner => Err(AccessError::ForbiddenNotOwner),
            Self::ForbiddenRole => Err(AccessError::ForbiddenRole),
            Self::UnauthorizedNoPrincipal => Err(AccessError::UnauthorizedNoPrincipal),
        }
    }
}

/// Decide whether `principal` may perform `operation` on a resource owned
/// by `owner` that is currently in `status`.
///
/// For versions and downloads, pass the *parent project's* owner and
/// status. Versions carry no status of their own.
pub fn decide(
    principal: Option<&Principal>,
    owner: &UserId,
    status: ProjectStatus,
    operation: Operation,
) -> Decision {
    if operation == Operation::Read && status.is_public() {
        return Decision::Allow;
    }

    let Some(principal) = principal else {
        return Decision::UnauthorizedNoPrincipal;
    };

    match operation {
        Operation::Read => {
            if principal.is(owner) {
                Decision::Allow
            } else if status == ProjectStatus::Pending && principal.role.is_staff() {
                Decision::Allow
            } else {
                Decision::ForbiddenNotOwner
            }
        }
        Operation::OwnerMutation => {
            if principal.is(owner) {
                Decision::Allow
            } else {
                Decision::ForbiddenNotOwner
            }
        }
        Operation::StaffAction => {
            if principal.role.is_staff() {
                Decision::Allow
            } else {
                Decision::ForbiddenRole
            }
        }
    }
}

/// Require a staff principal for an action that is not tied to a single
/// project, such as the review queue.
pub fn require_staff(principal: Option<&Principal>) -> Result<(), AccessError> {
    match principal {
        None => Err(AccessError::UnauthorizedNoPrincipal),
        Some(p) if p.role.is_staff() => Ok(()),
        Some(_) => Err(AccessError::ForbiddenRole),
    }
}

/// Require any authenticated principal.
pub fn require_principal(principal: Option<&Principal>) -> Result<&Principal, AccessError> {
    principal.ok_or(AccessError::UnauthorizedNoPrincipal)
}
