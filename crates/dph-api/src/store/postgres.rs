//! PostgreSQL store.
//!
//! Each mutating method opens one transaction, locks the project row with
//! `SELECT ... FOR UPDATE`, evaluates the caller's closure against the
//! locked row, and commits only if every step succeeded. The transaction
//! is the atomic unit.

use async_trait::async_trait;
use dph_core::{PageRequest, ProjectStatus, Role, VersionSelector};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{
    DownloadOutcome, Guard, Mutation, MutationOutcome, ProjectFilter, ProjectStore,
    RollbackOutcome, StoreError, UserStore,
};
use crate::db;
use crate::state::{ProjectRecord, UserRecord, VersionRecord};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Commit on success, roll back otherwise.
    ///
    /// Domain outcomes (rejection, not-found, conflict, illegal stored
    /// state) pass through unchanged once the rollback is confirmed. Any
    /// other failure, or a failed rollback, is reported as
    /// [`StoreError::AtomicUnitFailed`].
    async fn finish<T>(
        tx: Transaction<'static, Postgres>,
        result: Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let err = match result {
            Ok(value) => {
                return match tx.commit().await {
                    Ok(()) => Ok(value),
                    Err(e) => {
                        tracing::warn!(error = %e, "transaction commit failed");
                        Err(StoreError::AtomicUnitFailed {
                            cause: Box::new(e.into()),
                            rollback: RollbackOutcome::RolledBack,
                        })
                    }
                };
            }
            Err(err) => err,
        };

        let rollback = match tx.rollback().await {
            Ok(()) => RollbackOutcome::RolledBack,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    cause = %err,
                    "ROLLBACK_FAILED: transaction rollback failed, store consistency unknown"
                );
                RollbackOutcome::Failed(e.to_string())
            }
        };

        Err(classify_failure(err, rollback))
    }
}

/// The error a failed unit reports once its rollback has been attempted.
fn classify_failure(err: StoreError, rollback: RollbackOutcome) -> StoreError {
    match (err, rollback) {
        (
            err @ (StoreError::Rejected(_)
            | StoreError::NotFound { .. }
            | StoreError::Conflict(_)
            | StoreError::IllegalStoredState { .. }),
            RollbackOutcome::RolledBack,
        ) => err,
        (err, rollback) => StoreError::AtomicUnitFailed {
            cause: Box::new(err),
            rollback,
        },
    }
}

async fn locked_project(conn: &mut PgConnection, id: Uuid) -> Result<ProjectRecord, StoreError> {
    db::projects::get_for_update(&mut *conn, id)
        .await?
        .ok_or_else(|| StoreError::project_not_found(id))
}

async fn update_in(
    conn: &mut PgConnection,
    id: Uuid,
    mutation: Mutation,
) -> Result<MutationOutcome, StoreError> {
    let mut project = locked_project(conn, id).await?;
    let transition = mutation(&mut project)?;
    project.id = id;

    if !db::projects::update(&mut *conn, &project).await? {
        return Err(StoreError::project_not_found(id));
    }
    Ok(MutationOutcome {
        project,
        transition,
    })
}

async fn delete_in(
    conn: &mut PgConnection,
    id: Uuid,
    guard: Guard,
) -> Result<ProjectRecord, StoreError> {
    let project = locked_project(conn, id).await?;
    guard(&project)?;

    let removed = db::versions::delete_for_project(&mut *conn, id).await?;
    if !db::projects::delete(&mut *conn, id).await? {
        return Err(StoreError::project_not_found(id));
    }
    tracing::debug!(project_id = %id, versions = removed, "project deleted");
    Ok(project)
}

async fn insert_version_in(
    conn: &mut PgConnection,
    version: VersionRecord,
    guard: Guard,
) -> Result<VersionRecord, StoreError> {
    let project = locked_project(conn, version.project_id).await?;
    guard(&project)?;

    db::versions::insert(&mut *conn, &version).await?;
    db::projects::touch(&mut *conn, project.id, version.created_at).await?;
    Ok(version)
}

async fn download_in(
    conn: &mut PgConnection,
    project_id: Uuid,
    selector: VersionSelector,
    guard: Guard,
) -> Result<DownloadOutcome, StoreError> {
    let mut project = locked_project(conn, project_id).await?;
    guard(&project)?;

    let versions = db::versions::list_for_project(&mut *conn, project_id).await?;
    let index = selector
        .resolve(versions.len())
        .ok_or_else(|| StoreError::version_not_found(project_id, selector))?;
    let mut version = versions
        .into_iter()
        .nth(index)
        .ok_or_else(|| StoreError::version_not_found(project_id, selector))?;

    let counted = project.status == ProjectStatus::Live;
    if counted {
        project.downloads = db::projects::increment_downloads(&mut *conn, project_id)
            .await?
            .ok_or_else(|| StoreError::project_not_found(project_id))?;
        version = db::versions::increment_downloads(&mut *conn, version.id)
            .await?
            .ok_or_else(|| StoreError::version_not_found(project_id, selector))?;
    }

    Ok(DownloadOutcome {
        project,
        version,
        counted,
    })
}

#[async_trait]
impl ProjectStore for PgStore {
    async fn insert_project(&self, project: ProjectRecord) -> Result<ProjectRecord, StoreError> {
        db::projects::insert(&self.pool, &project).await?;
        Ok(project)
    }

    async fn project_by_id(&self, id: Uuid) -> Result<Option<ProjectRecord>, StoreError> {
        db::projects::get_by_id(&self.pool, id).await
    }

    async fn project_by_slug(&self, slug: &str) -> Result<Option<ProjectRecord>, StoreError> {
        db::projects::get_by_slug(&self.pool, slug).await
    }

    async fn list_projects(
        &self,
        filter: ProjectFilter,
        page: PageRequest,
    ) -> Result<Vec<ProjectRecord>, StoreError> {
        db::projects::list(&self.pool, &filter, page).await
    }

    async fn update_project(
        &self,
        id: Uuid,
        mutation: Mutation,
    ) -> Result<MutationOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = update_in(&mut tx, id, mutation).await;
        Self::finish(tx, result).await
    }

    async fn delete_project(&self, id: Uuid, guard: Guard) -> Result<ProjectRecord, StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = delete_in(&mut tx, id, guard).await;
        Self::finish(tx, result).await
    }

    async fn insert_version(
        &self,
        version: VersionRecord,
        guard: Guard,
    ) -> Result<VersionRecord, StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = insert_version_in(&mut tx, version, guard).await;
        Self::finish(tx, result).await
    }

    async fn list_versions(&self, project_id: Uuid) -> Result<Vec<VersionRecord>, StoreError> {
        db::versions::list_for_project(&self.pool, project_id).await
    }

    async fn record_download(
        &self,
        project_id: Uuid,
        selector: VersionSelector,
        guard: Guard,
    ) -> Result<DownloadOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = download_in(&mut tx, project_id, selector, guard).await;
        Self::finish(tx, result).await
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: UserRecord) -> Result<UserRecord, StoreError> {
        db::users::insert(&self.pool, &user).await?;
        Ok(user)
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        db::users::get_by_id(&self.pool, id).await
    }

    async fn user_by_token(&self, token: &str) -> Result<Option<UserRecord>, StoreError> {
        db::users::get_by_token(&self.pool, token).await
    }

    async fn users_by_role(&self, role: Role) -> Result<Vec<UserRecord>, StoreError> {
        db::users::list_by_role(&self.pool, role).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Rejection;
    use dph_core::AccessError;

    #[test]
    fn domain_outcomes_pass_through_after_rollback() {
        let err = classify_failure(
            StoreError::Conflict("slug taken".into()),
            RollbackOutcome::RolledBack,
        );
        assert!(matches!(err, StoreError::Conflict(ref m) if m == "slug taken"));

        let err = classify_failure(
            StoreError::Rejected(Rejection::Access(AccessError::ForbiddenNotOwner)),
            RollbackOutcome::RolledBack,
        );
        assert!(matches!(
            err,
            StoreError::Rejected(Rejection::Access(AccessError::ForbiddenNotOwner))
        ));

        let id = Uuid::new_v4();
        let err = classify_failure(StoreError::project_not_found(id), RollbackOutcome::RolledBack);
        assert!(matches!(err, StoreError::NotFound { entity: "project", .. }));

        let err = classify_failure(
            StoreError::IllegalStoredState {
                entity: "project",
                id,
                field: "status",
                value: "archived".into(),
            },
            RollbackOutcome::RolledBack,
        );
        assert!(matches!(err, StoreError::IllegalStoredState { .. }));
    }

    #[test]
    fn backend_failure_is_wrapped() {
        let err = classify_failure(
            StoreError::Backend("connection reset".into()),
            RollbackOutcome::RolledBack,
        );
        match err {
            StoreError::AtomicUnitFailed { cause, rollback } => {
                assert!(matches!(*cause, StoreError::Backend(_)));
                assert_eq!(rollback, RollbackOutcome::RolledBack);
            }
            other => panic!("expected AtomicUnitFailed, got {other:?}"),
        }
    }

    #[test]
    fn failed_rollback_wraps_even_domain_outcomes() {
        let err = classify_failure(
            StoreError::Conflict("slug taken".into()),
            RollbackOutcome::Failed("broken pipe".into()),
        );
        match err {
            StoreError::AtomicUnitFailed { cause, rollback } => {
                assert!(matches!(*cause, StoreError::Conflict(_)));
                assert_eq!(rollback, RollbackOutcome::Failed("broken pipe".into()));
            }
            other => panic!("expected AtomicUnitFailed, got {other:?}"),
        }
    }
}
