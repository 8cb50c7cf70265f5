//! In-memory store.
//!
//! All tables sit behind one `parking_lot::RwLock`, so a write lock is the
//! atomic unit. Mutations run against a staged copy of the row, which is
//! published only when every check has passed. Methods never hold the lock
//! across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dph_core::{PageRequest, ProjectStatus, Role, VersionSelector};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{
    DownloadOutcome, Guard, Mutation, MutationOutcome, ProjectFilter, ProjectOrder, ProjectStore,
    StoreError, UserStore,
};
use crate::auth::constant_time_token_eq;
use crate::state::{ProjectRecord, UserRecord, VersionRecord};

#[derive(Debug, Default)]
struct Tables {
    projects: HashMap<Uuid, ProjectRecord>,
    /// Versions per project, oldest first.
    versions: HashMap<Uuid, Vec<VersionRecord>>,
    users: HashMap<Uuid, UserRecord>,
}

impl Tables {
    /// Find a project other than `except` sharing the title or slug.
    fn name_conflict(&self, title: &str, slug: &str, except: Option<Uuid>) -> Option<String> {
        let title = title.to_lowercase();
        let slug = slug.to_lowercase();
        self.projects
            .values()
            .filter(|p| Some(p.id) != except)
            .find_map(|p| {
                if p.title.to_lowercase() == title {
                    Some(format!("a project titled {:?} already exists", p.title))
                } else if p.slug.to_lowercase() == slug {
                    Some(format!("a project with slug {:?} already exists", p.slug))
                } else {
                    None
                }
            })
    }
}

/// Thread-safe, cloneable in-memory implementation of both store traits.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_projects(projects: &mut [ProjectRecord], order: ProjectOrder) {
    match order {
        ProjectOrder::MostDownloaded => projects.sort_by(|a, b| {
            b.downloads
                .cmp(&a.downloads)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        }),
        ProjectOrder::OldestUpdated => projects.sort_by(|a, b| {
            a.updated_at
                .cmp(&b.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        }),
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn insert_project(&self, project: ProjectRecord) -> Result<ProjectRecord, StoreError> {
        let mut tables = self.tables.write();
        if let Some(conflict) = tables.name_conflict(&project.title, &project.slug, None) {
            return Err(StoreError::Conflict(conflict));
        }
        tables.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn project_by_id(&self, id: Uuid) -> Result<Option<ProjectRecord>, StoreError> {
        Ok(self.tables.read().projects.get(&id).cloned())
    }

    async fn project_by_slug(&self, slug: &str) -> Result<Option<ProjectRecord>, StoreError> {
        let slug = slug.to_lowercase();
        Ok(self
            .tables
            .read()
            .projects
            .values()
            .find(|p| p.slug.to_lowercase() == slug)
            .cloned())
    }

    async fn list_projects(
        &self,
        filter: ProjectFilter,
        page: PageRequest,
    ) -> Result<Vec<ProjectRecord>, StoreError> {
        let mut hits: Vec<ProjectRecord> = self
            .tables
            .read()
            .projects
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        sort_projects(&mut hits, filter.order);
        Ok(page.slice(hits))
    }

    async fn update_project(
        &self,
        id: Uuid,
        mutation: Mutation,
    ) -> Result<MutationOutcome, StoreError> {
        let mut tables = self.tables.write();
        let mut staged = tables
            .projects
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::project_not_found(id))?;

        let transition = mutation(&mut staged)?;

        if let Some(conflict) = tables.name_conflict(&staged.title, &staged.slug, Some(id)) {
            return Err(StoreError::Conflict(conflict));
        }

        tables.projects.insert(id, staged.clone());
        Ok(MutationOutcome {
            project: staged,
            transition,
        })
    }

    async fn delete_project(&self, id: Uuid, guard: Guard) -> Result<ProjectRecord, StoreError> {
        let mut tables = self.tables.write();
        let project = tables
            .projects
            .get(&id)
            .ok_or_else(|| StoreError::project_not_found(id))?;
        guard(project)?;

        tables.versions.remove(&id);
        tables
            .projects
            .remove(&id)
            .ok_or_else(|| StoreError::project_not_found(id))
    }

    async fn insert_version(
        &self,
        version: VersionRecord,
        guard: Guard,
    ) -> Result<VersionRecord, StoreError> {
        let mut tables = self.tables.write();
        let project_id = version.project_id;
        let project = tables
            .projects
            .get(&project_id)
            .ok_or_else(|| StoreError::project_not_found(project_id))?;
        guard(project)?;

        let versions = tables.versions.entry(project_id).or_default();
        versions.push(version.clone());
        versions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        if let Some(project) = tables.projects.get_mut(&project_id) {
            project.updated_at = version.created_at;
        }
        Ok(version)
    }

    async fn list_versions(&self, project_id: Uuid) -> Result<Vec<VersionRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .versions
            .get(&project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn record_download(
        &self,
        project_id: Uuid,
        selector: VersionSelector,
        guard: Guard,
    ) -> Result<DownloadOutcome, StoreError> {
        let mut tables = self.tables.write();
        let project = tables
            .projects
            .get(&project_id)
            .ok_or_else(|| StoreError::project_not_found(project_id))?;
        guard(project)?;
        let counted = project.status == ProjectStatus::Live;

        let len = tables.versions.get(&project_id).map_or(0, Vec::len);
        let index = selector
            .resolve(len)
            .ok_or_else(|| StoreError::version_not_found(project_id, selector))?;

        let version = match tables
            .versions
            .get_mut(&project_id)
            .and_then(|v| v.get_mut(index))
        {
            Some(version) => {
                if counted {
                    version.downloads += 1;
                }
                version.clone()
            }
            None => return Err(StoreError::version_not_found(project_id, selector)),
        };

        let project = match tables.projects.get_mut(&project_id) {
            Some(project) => {
                if counted {
                    project.downloads += 1;
                }
                project.clone()
            }
            None => return Err(StoreError::project_not_found(project_id)),
        };

        Ok(DownloadOutcome {
            project,
            version,
            counted,
        })
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: UserRecord) -> Result<UserRecord, StoreError> {
        let mut tables = self.tables.write();
        let wanted = user.username.to_lowercase();
        if tables
            .users
            .values()
            .any(|u| u.username.to_lowercase() == wanted)
        {
            return Err(StoreError::Conflict(format!(
                "username {:?} is already taken",
                user.username
            )));
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn user_by_token(&self, token: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| constant_time_token_eq(token, &u.token))
            .cloned())
    }

    async fn users_by_role(&self, role: Role) -> Result<Vec<UserRecord>, StoreError> {
        let mut users: Vec<UserRecord> = self
            .tables
            .read()
            .users
            .values()
            .filter(|u| u.role == role)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }
}
