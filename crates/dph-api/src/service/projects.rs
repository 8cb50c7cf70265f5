//! Project, version and moderation operations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dph_core::validation::{
    validate_body, validate_categories, validate_description, validate_link, validate_slug,
    validate_supports, validate_title, validate_version_code, validate_version_description,
    validate_version_title,
};
use dph_core::{
    decide, require_principal, require_staff, Operation, PageBounds, PageRequest, Principal,
    ProjectStatus, ValidationError, VersionSelector,
};
use dph_state::{fire, on_content_edit, resolve_trigger, TransitionRecord};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::ServiceError;
use crate::state::{ProjectRecord, VersionRecord};
use crate::store::{
    DownloadOutcome, Guard, ProjectFilter, ProjectOrder, ProjectStore, Rejection, StoreError,
};

// ── Inputs ──────────────────────────────────────────────────────────────────

/// Fields of a new project.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewProject {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
}

impl NewProject {
    pub fn check(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        validate_slug(&self.slug)?;
        validate_description(&self.description)?;
        validate_body(&self.body)?;
        validate_categories(&self.category)?;
        if let Some(icon) = &self.icon {
            validate_link("icon", icon)?;
        }
        Ok(())
    }
}

/// A partial content edit. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ContentEdit {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub category: Option<Vec<String>>,
    pub icon: Option<String>,
    pub license: Option<String>,
}

impl ContentEdit {
    pub fn check(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(slug) = &self.slug {
            validate_slug(slug)?;
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        if let Some(body) = &self.body {
            validate_body(body)?;
        }
        if let Some(category) = &self.category {
            validate_categories(category)?;
        }
        if let Some(icon) = &self.icon {
            validate_link("icon", icon)?;
        }
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.slug.is_none()
            && self.description.is_none()
            && self.body.is_none()
            && self.category.is_none()
            && self.icon.is_none()
            && self.license.is_none()
    }

    fn apply(self, project: &mut ProjectRecord) {
        if let Some(title) = self.title {
            project.title = title;
        }
        if let Some(slug) = self.slug {
            project.slug = slug;
        }
        if let Some(description) = self.description {
            project.description = description;
        }
        if let Some(body) = self.body {
            project.body = body;
        }
        if let Some(category) = self.category {
            project.category = category;
        }
        if let Some(icon) = self.icon {
            project.icon = Some(icon);
        }
        if let Some(license) = self.license {
            project.license = Some(license);
        }
    }
}

/// Fields of a new version. Versions are immutable once created.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewVersion {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub version_code: String,
    pub supports: Vec<String>,
    pub download_link: String,
    #[serde(default)]
    pub resource_pack_link: Option<String>,
}

impl NewVersion {
    pub fn check(&self) -> Result<(), ValidationError> {
        validate_version_title(&self.title)?;
        validate_version_description(&self.description)?;
        validate_version_code(&self.version_code)?;
        validate_supports(&self.supports)?;
        validate_link("download_link", &self.download_link)?;
        if let Some(link) = &self.resource_pack_link {
            validate_link("resource_pack_link", link)?;
        }
        Ok(())
    }
}

// ── Outputs ─────────────────────────────────────────────────────────────────

/// A project after a status change, with the record of that change.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransitionOutcome {
    pub project: ProjectRecord,
    #[schema(value_type = Object)]
    pub transition: TransitionRecord,
}

/// A project after a content edit. `transition` is set when the edit
/// demoted a live project back to draft.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EditOutcome {
    pub project: ProjectRecord,
    #[schema(value_type = Option<Object>)]
    pub transition: Option<TransitionRecord>,
}

// ── Service ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ProjectService {
    store: Arc<dyn ProjectStore>,
    bounds: PageBounds,
    max_feature_days: u32,
}

impl std::fmt::Debug for ProjectService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectService")
            .field("bounds", &self.bounds)
            .field("max_feature_days", &self.max_feature_days)
            .finish_non_exhaustive()
    }
}

fn parse_status(target: &str) -> Result<ProjectStatus, ServiceError> {
    target
        .parse::<ProjectStatus>()
        .map_err(|e| ServiceError::BadRequest(e.to_string()))
}

fn parse_selector(selector: &str) -> Result<VersionSelector, ServiceError> {
    selector
        .parse::<VersionSelector>()
        .map_err(|e| ServiceError::BadRequest(e.to_string()))
}

/// Guard admitting callers the read policy allows.
fn read_guard(principal: Option<Principal>) -> Guard {
    Box::new(move |project: &ProjectRecord| {
        decide(
            principal.as_ref(),
            &project.owner(),
            project.status,
            Operation::Read,
        )
        .into_result()
        .map_err(Rejection::from)
    })
}

/// Guard admitting only the project owner.
fn owner_guard(principal: Option<Principal>) -> Guard {
    Box::new(move |project: &ProjectRecord| {
        decide(
            principal.as_ref(),
            &project.owner(),
            project.status,
            Operation::OwnerMutation,
        )
        .into_result()
        .map_err(Rejection::from)
    })
}

impl ProjectService {
    pub fn new(store: Arc<dyn ProjectStore>, bounds: PageBounds, max_feature_days: u32) -> Self {
        Self {
            store,
            bounds,
            max_feature_days,
        }
    }

    pub fn page_bounds(&self) -> PageBounds {
        self.bounds
    }

    // ── Listings ────────────────────────────────────────────────────────

    /// Live projects, most downloaded first. An oversized limit is clamped.
    pub async fn list_public(
        &self,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<ProjectRecord>, ServiceError> {
        let page = PageRequest::clamped(page, limit, self.bounds)?;
        let filter = ProjectFilter {
            status: Some(ProjectStatus::Live),
            ..ProjectFilter::default()
        };
        Ok(self.store.list_projects(filter, page).await?)
    }

    /// Live projects whose title, description or slug contains `query`.
    /// Out-of-range pagination is rejected rather than clamped.
    pub async fn search(
        &self,
        query: &str,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<ProjectRecord>, ServiceError> {
        let page = PageRequest::strict(page, limit, self.bounds)?;
        let query = query.trim();
        let filter = ProjectFilter {
            status: Some(ProjectStatus::Live),
            text: (!query.is_empty()).then(|| query.to_string()),
            ..ProjectFilter::default()
        };
        Ok(self.store.list_projects(filter, page).await?)
    }

    /// Live projects whose featured window is open at `now`. An oversized
    /// limit is clamped.
    pub async fn list_featured(
        &self,
        now: DateTime<Utc>,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<ProjectRecord>, ServiceError> {
        let page = PageRequest::clamped(page, limit, self.bounds)?;
        let filter = ProjectFilter {
            status: Some(ProjectStatus::Live),
            featured_at: Some(now),
            ..ProjectFilter::default()
        };
        Ok(self.store.list_projects(filter, page).await?)
    }

    /// Pending projects, least recently updated first. Staff only.
    pub async fn review_queue(
        &self,
        principal: Option<&Principal>,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<ProjectRecord>, ServiceError> {
        require_staff(principal)?;
        let page = PageRequest::clamped(page, limit, self.bounds)?;
        let filter = ProjectFilter {
            status: Some(ProjectStatus::Pending),
            order: ProjectOrder::OldestUpdated,
            ..ProjectFilter::default()
        };
        Ok(self.store.list_projects(filter, page).await?)
    }

    /// An owner's projects. The owner sees every status; everyone else
    /// sees only live ones.
    pub async fn list_by_owner(
        &self,
        owner: Uuid,
        principal: Option<&Principal>,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<ProjectRecord>, ServiceError> {
        let page = PageRequest::clamped(page, limit, self.bounds)?;
        let is_owner = principal.is_some_and(|p| p.id.0 == owner);
        let filter = ProjectFilter {
            owner_id: Some(owner),
            status: (!is_owner).then_some(ProjectStatus::Live),
            ..ProjectFilter::default()
        };
        Ok(self.store.list_projects(filter, page).await?)
    }

    // ── Single project ──────────────────────────────────────────────────

    fn check_read(
        project: ProjectRecord,
        principal: Option<&Principal>,
    ) -> Result<ProjectRecord, ServiceError> {
        decide(principal, &project.owner(), project.status, Operation::Read).into_result()?;
        Ok(project)
    }

    pub async fn get_by_id(
        &self,
        id: Uuid,
        principal: Option<&Principal>,
    ) -> Result<ProjectRecord, ServiceError> {
        let project = self
            .store
            .project_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::from(StoreError::project_not_found(id)))?;
        Self::check_read(project, principal)
    }

    pub async fn get_by_slug(
        &self,
        slug: &str,
        principal: Option<&Principal>,
    ) -> Result<ProjectRecord, ServiceError> {
        let project = self
            .store
            .project_by_slug(slug)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("project {slug:?} not found")))?;
        Self::check_read(project, principal)
    }

    /// Owner check ahead of input validation. The mutation itself
    /// re-checks inside its atomic unit.
    async fn authorize_owner(
        &self,
        id: Uuid,
        principal: Option<&Principal>,
    ) -> Result<(), ServiceError> {
        require_principal(principal)?;
        let project = self
            .store
            .project_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::from(StoreError::project_not_found(id)))?;
        decide(principal, &project.owner(), project.status, Operation::OwnerMutation)
            .into_result()?;
        Ok(())
    }

    /// Create a draft owned by the caller.
    pub async fn create_draft(
        &self,
        input: NewProject,
        principal: Option<&Principal>,
    ) -> Result<ProjectRecord, ServiceError> {
        let principal = require_principal(principal)?;
        input.check()?;

        let now = Utc::now();
        let record = ProjectRecord {
            id: Uuid::new_v4(),
            owner_id: principal.id.0,
            title: input.title,
            slug: input.slug,
            description: input.description,
            body: input.body,
            status: ProjectStatus::Draft,
            downloads: 0,
            featured_until: None,
            category: input.category,
            icon: input.icon,
            license: input.license,
            created_at: now,
            updated_at: now,
        };

        let project = self.store.insert_project(record).await?;
        tracing::info!(project_id = %project.id, owner_id = %project.owner_id, "project created");
        Ok(project)
    }

    /// Edit a project's content. Editing a live project demotes it to
    /// draft.
    pub async fn update_content(
        &self,
        id: Uuid,
        edit: ContentEdit,
        principal: Option<&Principal>,
    ) -> Result<EditOutcome, ServiceError> {
        self.authorize_owner(id, principal).await?;
        edit.check()?;
        if edit.is_empty() {
            return Err(ServiceError::BadRequest("no fields to update".into()));
        }
        let principal = principal.copied();
        let now = Utc::now();

        let outcome = self
            .store
            .update_project(
                id,
                Box::new(move |project: &mut ProjectRecord| {
                    let caller = principal.as_ref();
                    decide(caller, &project.owner(), project.status, Operation::OwnerMutation)
                        .into_result()?;
                    let actor = require_principal(caller)?.id;
                    edit.apply(project);
                    Ok(on_content_edit(project, actor, now))
                }),
            )
            .await?;

        if let Some(t) = &outcome.transition {
            tracing::info!(
                project_id = %id,
                trigger = %t.trigger,
                from = %t.from,
                to = %t.to,
                "project demoted after content edit"
            );
        }
        Ok(EditOutcome {
            project: outcome.project,
            transition: outcome.transition,
        })
    }

    /// Move a project to `target` status.
    ///
    /// The trigger is chosen from the current status, the target and
    /// whether the caller owns the project. Both the read policy and the
    /// trigger's authority are evaluated against the locked row.
    pub async fn transition(
        &self,
        id: Uuid,
        target: &str,
        principal: Option<&Principal>,
    ) -> Result<TransitionOutcome, ServiceError> {
        let target = parse_status(target)?;
        let principal = principal.copied();
        let now = Utc::now();

        let outcome = self
            .store
            .update_project(
                id,
                Box::new(move |project: &mut ProjectRecord| {
                    let caller = principal.as_ref();
                    let owner = project.owner();
                    decide(caller, &owner, project.status, Operation::Read).into_result()?;
                    let actor = require_principal(caller)?;
                    let trigger = resolve_trigger(project.status, target, actor.is(&owner))?;
                    decide(
                        Some(actor),
                        &owner,
                        project.status,
                        trigger.authority().operation(),
                    )
                    .into_result()?;
                    Ok(Some(fire(project, trigger, actor.id, now)?))
                }),
            )
            .await?;

        let transition = outcome
            .transition
            .ok_or_else(|| ServiceError::Internal("transition applied without a record".into()))?;
        tracing::info!(
            project_id = %id,
            trigger = %transition.trigger,
            from = %transition.from,
            to = %transition.to,
            actor = %transition.actor,
            "project status changed"
        );
        Ok(TransitionOutcome {
            project: outcome.project,
            transition,
        })
    }

    /// Feature a project for `days` days. Staff only.
    pub async fn feature(
        &self,
        id: Uuid,
        days: i64,
        principal: Option<&Principal>,
    ) -> Result<ProjectRecord, ServiceError> {
        let principal = principal.copied();
        let max_days = self.max_feature_days;
        let now = Utc::now();

        let outcome = self
            .store
            .update_project(
                id,
                Box::new(move |project: &mut ProjectRecord| {
                    decide(
                        principal.as_ref(),
                        &project.owner(),
                        project.status,
                        Operation::StaffAction,
                    )
                    .into_result()?;
                    dph_state::feature(project, days, max_days, now)?;
                    Ok(None)
                }),
            )
            .await?;

        tracing::info!(project_id = %id, days, "project featured");
        Ok(outcome.project)
    }

    /// Clear a project's featured window. Staff only.
    pub async fn unfeature(
        &self,
        id: Uuid,
        principal: Option<&Principal>,
    ) -> Result<ProjectRecord, ServiceError> {
        let principal = principal.copied();
        let now = Utc::now();

        let outcome = self
            .store
            .update_project(
                id,
                Box::new(move |project: &mut ProjectRecord| {
                    decide(
                        principal.as_ref(),
                        &project.owner(),
                        project.status,
                        Operation::StaffAction,
                    )
                    .into_result()?;
                    dph_state::unfeature(project, now);
                    Ok(None)
                }),
            )
            .await?;

        Ok(outcome.project)
    }

    /// Delete a project and all of its versions. Owner only; irreversible.
    pub async fn delete(
        &self,
        id: Uuid,
        principal: Option<&Principal>,
    ) -> Result<ProjectRecord, ServiceError> {
        let project = self
            .store
            .delete_project(id, owner_guard(principal.copied()))
            .await?;
        tracing::info!(project_id = %id, "project deleted");
        Ok(project)
    }

    // ── Versions ────────────────────────────────────────────────────────

    /// All versions of a readable project, oldest first.
    pub async fn list_versions(
        &self,
        id: Uuid,
        principal: Option<&Principal>,
    ) -> Result<Vec<VersionRecord>, ServiceError> {
        self.get_by_id(id, principal).await?;
        Ok(self.store.list_versions(id).await?)
    }

    /// One version, addressed by creation ordinal or `latest`.
    pub async fn get_version(
        &self,
        id: Uuid,
        selector: &str,
        principal: Option<&Principal>,
    ) -> Result<VersionRecord, ServiceError> {
        let selector = parse_selector(selector)?;
        let versions = self.list_versions(id, principal).await?;
        selector
            .resolve(versions.len())
            .and_then(|i| versions.into_iter().nth(i))
            .ok_or_else(|| StoreError::version_not_found(id, selector).into())
    }

    /// Add a version to a project. Owner only.
    pub async fn create_version(
        &self,
        id: Uuid,
        input: NewVersion,
        principal: Option<&Principal>,
    ) -> Result<VersionRecord, ServiceError> {
        self.authorize_owner(id, principal).await?;
        input.check()?;

        let record = VersionRecord {
            id: Uuid::new_v4(),
            project_id: id,
            title: input.title,
            description: input.description,
            version_code: input.version_code,
            supports: input.supports,
            downloads: 0,
            download_link: input.download_link,
            resource_pack_link: input.resource_pack_link,
            created_at: Utc::now(),
        };

        let version = self
            .store
            .insert_version(record, owner_guard(principal.copied()))
            .await?;
        tracing::info!(project_id = %id, version_id = %version.id, "version created");
        Ok(version)
    }

    /// Resolve a version for download. Counters move only for live
    /// projects.
    pub async fn download(
        &self,
        id: Uuid,
        selector: &str,
        principal: Option<&Principal>,
    ) -> Result<DownloadOutcome, ServiceError> {
        let selector = parse_selector(selector)?;
        let outcome = self
            .store
            .record_download(id, selector, read_guard(principal.copied()))
            .await?;
        tracing::debug!(
            project_id = %id,
            version_id = %outcome.version.id,
            counted = outcome.counted,
            "version downloaded"
        );
        Ok(outcome)
    }
}
