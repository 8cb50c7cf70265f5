//! # Access-Gated Query Façade
//!
//! The only path by which projects, versions and accounts are read or
//! changed. Every operation takes the resolved caller (`Option<Principal>`)
//! and evaluates the access policy before any data leaves the service.
//! Decisions that depend on the current row are made inside the store's
//! atomic unit, against the locked row.

pub mod accounts;
pub mod projects;

use dph_core::{AccessError, CredentialError, PageError, ProjectStatus, ValidationError};
use dph_state::{FeatureError, LifecycleError};
use thiserror::Error;

use crate::store::{Rejection, RollbackOutcome, StoreError};

/// Failure taxonomy of the façade.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    #[error("credential does not match any user")]
    UnknownCredential,

    #[error("authentication required")]
    Unauthorized,

    #[error("caller is not the owner of this project")]
    ForbiddenNotOwner,

    #[error("this action requires a moderator or admin role")]
    ForbiddenRole,

    #[error("invalid project transition: {from} -> {to}")]
    InvalidTransition {
        from: ProjectStatus,
        to: ProjectStatus,
    },

    #[error("project is already {status}")]
    AlreadyInStatus { status: ProjectStatus },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    /// Malformed input that is not a field-level validation failure
    /// (unknown status, bad pagination, bad selector).
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(String),

    /// A unit failed and was rolled back cleanly.
    #[error("atomic unit failed: {0}")]
    AtomicUnitFailed(String),

    /// A unit failed and its rollback failed too. Consistency is unknown.
    #[error("rollback failed: {0}")]
    RollbackFailed(String),

    #[error("illegal stored state: {0}")]
    IllegalStoredState(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CredentialError> for ServiceError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::MalformedCredential(reason) => {
                Self::MalformedCredential(reason.to_string())
            }
            CredentialError::UnknownCredential => Self::UnknownCredential,
        }
    }
}

impl From<AccessError> for ServiceError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::ForbiddenNotOwner => Self::ForbiddenNotOwner,
            AccessError::ForbiddenRole => Self::ForbiddenRole,
            AccessError::UnauthorizedNoPrincipal => Self::Unauthorized,
        }
    }
}

impl From<LifecycleError> for ServiceError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::InvalidTransition { from, to } => Self::InvalidTransition { from, to },
            LifecycleError::AlreadyInStatus { status } => Self::AlreadyInStatus { status },
        }
    }
}

impl From<FeatureError> for ServiceError {
    fn from(err: FeatureError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<PageError> for ServiceError {
    fn from(err: PageError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<Rejection> for ServiceError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Access(e) => e.into(),
            Rejection::Lifecycle(e) => e.into(),
            Rejection::Feature(e) => e.into(),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound(err.to_string()),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Rejected(rejection) => rejection.into(),
            StoreError::IllegalStoredState { .. } => Self::IllegalStoredState(err.to_string()),
            StoreError::AtomicUnitFailed {
                rollback: RollbackOutcome::Failed(_),
                ..
            } => Self::RollbackFailed(err.to_string()),
            StoreError::AtomicUnitFailed { .. } => Self::AtomicUnitFailed(err.to_string()),
            StoreError::Backend(msg) => Self::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_unwraps_to_domain_variant() {
        let err: ServiceError = StoreError::Rejected(Rejection::Lifecycle(
            LifecycleError::AlreadyInStatus {
                status: ProjectStatus::Pending,
            },
        ))
        .into();
        assert!(matches!(
            err,
            ServiceError::AlreadyInStatus {
                status: ProjectStatus::Pending
            }
        ));

        let err: ServiceError =
            StoreError::Rejected(Rejection::Access(AccessError::ForbiddenRole)).into();
        assert!(matches!(err, ServiceError::ForbiddenRole));
    }

    #[test]
    fn rollback_failure_is_distinct_from_clean_failure() {
        let fatal: ServiceError = StoreError::AtomicUnitFailed {
            cause: Box::new(StoreError::Backend("reset".into())),
            rollback: RollbackOutcome::Failed("reset".into()),
        }
        .into();
        assert!(matches!(fatal, ServiceError::RollbackFailed(_)));

        let clean: ServiceError = StoreError::AtomicUnitFailed {
            cause: Box::new(StoreError::Backend("deadlock".into())),
            rollback: RollbackOutcome::RolledBack,
        }
        .into();
        assert!(matches!(clean, ServiceError::AtomicUnitFailed(_)));
    }

    #[test]
    fn credential_errors_map_one_to_one() {
        let err: ServiceError = CredentialError::MalformedCredential("missing token").into();
        assert!(matches!(err, ServiceError::MalformedCredential(ref m) if m == "missing token"));
        let err: ServiceError = CredentialError::UnknownCredential.into();
        assert!(matches!(err, ServiceError::UnknownCredential));
    }

    #[test]
    fn page_errors_are_bad_requests() {
        let err: ServiceError = PageError::NegativePage(-1).into();
        assert!(matches!(err, ServiceError::BadRequest(_)));
    }
}
