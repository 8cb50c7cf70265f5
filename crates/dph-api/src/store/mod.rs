//! # Transactional Mutation Executor
//!
//! Storage seams for projects, versions and accounts. Every mutating method
//! on [`ProjectStore`] is one atomic unit: either all of its writes become
//! visible or none do.
//!
//! ## Guards run inside the unit
//!
//! Mutating methods take a closure ([`Mutation`] or [`Guard`]) that is
//! evaluated against the row *as locked by the unit*, not against a copy the
//! caller read earlier. Two concurrent publishes of the same draft therefore
//! serialize: the second one observes `pending` and its guard rejects.
//!
//! ## Failure model
//!
//! - Domain rejections raised by a closure surface as [`StoreError::Rejected`]
//!   after the unit has been rolled back.
//! - Backend failures mid-unit surface as [`StoreError::AtomicUnitFailed`],
//!   carrying the cause and the [`RollbackOutcome`]. A
//!   [`RollbackOutcome::Failed`] means consistency is unknown; it is fatal
//!   to the request and never retried.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dph_core::{AccessError, PageRequest, ProjectStatus, Role, VersionSelector};
use dph_state::{FeatureError, LifecycleError, TransitionRecord};
use thiserror::Error;
use uuid::Uuid;

use crate::state::{ProjectRecord, UserRecord, VersionRecord};

// ── Closures evaluated inside an atomic unit ────────────────────────────────

/// A domain-level refusal raised by a guard or mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Feature(#[from] FeatureError),
}

/// Read-only precondition evaluated against the locked project row.
pub type Guard = Box<dyn FnOnce(&ProjectRecord) -> Result<(), Rejection> + Send>;

/// Validate-and-modify step evaluated against the locked project row.
///
/// Returns the transition it applied, if any.
pub type Mutation =
    Box<dyn FnOnce(&mut ProjectRecord) -> Result<Option<TransitionRecord>, Rejection> + Send>;

/// Result of [`ProjectStore::update_project`].
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub project: ProjectRecord,
    pub transition: Option<TransitionRecord>,
}

/// Result of [`ProjectStore::record_download`].
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub project: ProjectRecord,
    pub version: VersionRecord,
    /// Whether the counters were incremented. Only downloads of live
    /// projects count.
    pub counted: bool,
}

// ── Queries ─────────────────────────────────────────────────────────────────

/// Row ordering for project listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectOrder {
    /// Highest download count first, newest first among equals.
    #[default]
    MostDownloaded,
    /// Least recently updated first. Used for the review queue.
    OldestUpdated,
}

/// Filter for [`ProjectStore::list_projects`]. All set fields must match.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,
    pub owner_id: Option<Uuid>,
    /// Case-insensitive substring over title, description and slug.
    pub text: Option<String>,
    /// Only projects whose featured window is open at this instant.
    pub featured_at: Option<DateTime<Utc>>,
    pub order: ProjectOrder,
}

impl ProjectFilter {
    pub fn matches(&self, project: &ProjectRecord) -> bool {
        if self.status.is_some_and(|s| s != project.status) {
            return false;
        }
        if self.owner_id.is_some_and(|o| o != project.owner_id) {
            return false;
        }
        if let Some(now) = self.featured_at {
            if !project.is_featured(now) {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let hit = [&project.title, &project.description, &project.slug]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

// ── Errors ──────────────────────────────────────────────────────────────────

/// Whether the backend managed to undo a failed unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    RolledBack,
    /// Rollback itself failed. Store consistency is unknown.
    Failed(String),
}

/// Errors raised by store implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness constraint would be violated. No row was written.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A guard or mutation refused the operation. Nothing was written.
    #[error("rejected: {0}")]
    Rejected(Rejection),

    /// A persisted value lies outside its closed enum.
    #[error("illegal stored {field} {value:?} on {entity} {id}")]
    IllegalStoredState {
        entity: &'static str,
        id: Uuid,
        field: &'static str,
        value: String,
    },

    /// The unit failed part way through.
    #[error("atomic unit failed: {cause} (rollback: {rollback:?})")]
    AtomicUnitFailed {
        cause: Box<StoreError>,
        rollback: RollbackOutcome,
    },

    /// The backend failed outside any unit, or before one was opened.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn project_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "project",
            id: id.to_string(),
        }
    }

    pub fn version_not_found(project_id: Uuid, selector: VersionSelector) -> Self {
        Self::NotFound {
            entity: "version",
            id: format!("{selector} of project {project_id}"),
        }
    }

    /// Whether store consistency can no longer be assumed.
    pub fn is_rollback_failure(&self) -> bool {
        matches!(
            self,
            Self::AtomicUnitFailed {
                rollback: RollbackOutcome::Failed(_),
                ..
            }
        )
    }
}

impl From<Rejection> for StoreError {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}

// ── Traits ──────────────────────────────────────────────────────────────────

/// Project and version persistence.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Insert a new project. Fails with `Conflict` when the title or slug
    /// matches an existing project case-insensitively.
    async fn insert_project(&self, project: ProjectRecord) -> Result<ProjectRecord, StoreError>;

    async fn project_by_id(&self, id: Uuid) -> Result<Option<ProjectRecord>, StoreError>;

    /// Case-insensitive slug lookup.
    async fn project_by_slug(&self, slug: &str) -> Result<Option<ProjectRecord>, StoreError>;

    async fn list_projects(
        &self,
        filter: ProjectFilter,
        page: PageRequest,
    ) -> Result<Vec<ProjectRecord>, StoreError>;

    /// Lock the project, apply `mutation`, re-check title/slug uniqueness,
    /// and write the result back.
    async fn update_project(
        &self,
        id: Uuid,
        mutation: Mutation,
    ) -> Result<MutationOutcome, StoreError>;

    /// Lock the project, run `guard`, then delete it and all its versions.
    async fn delete_project(&self, id: Uuid, guard: Guard) -> Result<ProjectRecord, StoreError>;

    /// Lock the parent project, run `guard`, insert the version, and stamp
    /// the project's `updated_at`.
    async fn insert_version(
        &self,
        version: VersionRecord,
        guard: Guard,
    ) -> Result<VersionRecord, StoreError>;

    /// All versions of a project, oldest first.
    async fn list_versions(&self, project_id: Uuid) -> Result<Vec<VersionRecord>, StoreError>;

    /// Lock the project, run `guard`, resolve `selector`, and increment the
    /// project and version counters when the project is live.
    async fn record_download(
        &self,
        project_id: Uuid,
        selector: VersionSelector,
        guard: Guard,
    ) -> Result<DownloadOutcome, StoreError>;
}

/// Account persistence and credential lookup.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. Fails with `Conflict` on a case-insensitive username
    /// match.
    async fn insert_user(&self, user: UserRecord) -> Result<UserRecord, StoreError>;

    async fn user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError>;

    async fn user_by_token(&self, token: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn users_by_role(&self, role: Role) -> Result<Vec<UserRecord>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(title: &str, slug: &str, status: ProjectStatus) -> ProjectRecord {
        let now = Utc::now();
        ProjectRecord {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: title.to_string(),
            slug: slug.to_string(),
            description: "A small data pack".to_string(),
            body: String::new(),
            status,
            downloads: 0,
            featured_until: None,
            category: Vec::new(),
            icon: None,
            license: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn filter_text_is_case_insensitive() {
        let p = project("Better Caves", "better-caves", ProjectStatus::Live);
        let filter = ProjectFilter {
            text: Some("CAVES".to_string()),
            ..ProjectFilter::default()
        };
        assert!(filter.matches(&p));
        let miss = ProjectFilter {
            text: Some("oceans".to_string()),
            ..ProjectFilter::default()
        };
        assert!(!miss.matches(&p));
    }

    #[test]
    fn filter_status_and_owner() {
        let p = project("Foo", "foo", ProjectStatus::Draft);
        let live_only = ProjectFilter {
            status: Some(ProjectStatus::Live),
            ..ProjectFilter::default()
        };
        assert!(!live_only.matches(&p));
        let mine = ProjectFilter {
            owner_id: Some(p.owner_id),
            ..ProjectFilter::default()
        };
        assert!(mine.matches(&p));
    }

    #[test]
    fn filter_featured_window() {
        let now = Utc::now();
        let mut p = project("Foo", "foo", ProjectStatus::Live);
        let filter = ProjectFilter {
            featured_at: Some(now),
            ..ProjectFilter::default()
        };
        assert!(!filter.matches(&p));
        p.featured_until = Some(now + chrono::Duration::hours(1));
        assert!(filter.matches(&p));
        p.featured_until = Some(now - chrono::Duration::hours(1));
        assert!(!filter.matches(&p));
    }

    #[test]
    fn rollback_failure_detection() {
        let fatal = StoreError::AtomicUnitFailed {
            cause: Box::new(StoreError::Backend("connection reset".into())),
            rollback: RollbackOutcome::Failed("connection reset".into()),
        };
        assert!(fatal.is_rollback_failure());
        let recovered = StoreError::AtomicUnitFailed {
            cause: Box::new(StoreError::Backend("deadlock".into())),
            rollback: RollbackOutcome::RolledBack,
        };
        assert!(!recovered.is_rollback_failure());
    }
}
