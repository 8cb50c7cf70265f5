//! # Project API
//!
//! Listing, search and lookup are open to anonymous callers for live
//! projects. Everything else goes through the ownership and role policy in
//! [`crate::service::projects::ProjectService`].

use std::time::Instant;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{PageQuery, ProjectPage};
use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::{
    extract_json, extract_path, extract_query, extract_validated_json, Validate,
};
use crate::service::projects::{ContentEdit, EditOutcome, NewProject, TransitionOutcome};
use crate::state::{AppState, ProjectRecord};

// ── Request DTOs ────────────────────────────────────────────────────────────

/// Requested target status. Case-insensitive.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusRequest {
    pub status: String,
}

impl Validate for StatusRequest {
    fn validate(&self) -> Result<(), String> {
        if self.status.trim().is_empty() {
            return Err("status must not be empty".to_string());
        }
        Ok(())
    }
}

/// How long to feature a project, in days.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FeatureRequest {
    pub days: i64,
}

/// Search query parameters.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Case-insensitive substring matched against title, description and
    /// slug.
    #[serde(default)]
    pub q: String,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

// ── Router ──────────────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/projects", get(list_projects).post(create_project))
        .route("/v1/projects/search", get(search_projects))
        .route("/v1/projects/featured", get(list_featured))
        .route("/v1/projects/slug/:slug", get(get_project_by_slug))
        .route(
            "/v1/projects/:id",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/v1/projects/:id/status", put(change_status))
        .route(
            "/v1/projects/:id/feature",
            put(feature_project).delete(unfeature_project),
        )
}

// ── Handlers ────────────────────────────────────────────────────────────────

/// GET /v1/projects: live projects, most downloaded first.
#[utoipa::path(
    get,
    path = "/v1/projects",
    params(PageQuery),
    responses(
        (status = 200, description = "Live projects", body = ProjectPage),
        (status = 400, description = "Invalid pagination", body = crate::error::ErrorBody),
    ),
    tag = "projects"
)]
pub(crate) async fn list_projects(
    State(state): State<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<ProjectPage>, AppError> {
    let started = Instant::now();
    let q = extract_query(query)?;
    let results = state.projects.list_public(q.page, q.limit).await?;
    Ok(Json(ProjectPage::new(results, started)))
}

/// GET /v1/projects/search: substring search over live projects.
#[utoipa::path(
    get,
    path = "/v1/projects/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching live projects", body = ProjectPage),
        (status = 400, description = "Invalid pagination", body = crate::error::ErrorBody),
    ),
    tag = "projects"
)]
pub(crate) async fn search_projects(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<ProjectPage>, AppError> {
    let started = Instant::now();
    let q = extract_query(query)?;
    let results = state.projects.search(&q.q, q.page, q.limit).await?;
    Ok(Json(ProjectPage::new(results, started)))
}

/// GET /v1/projects/featured: live projects with an open featured window,
/// most downloaded first.
#[utoipa::path(
    get,
    path = "/v1/projects/featured",
    params(PageQuery),
    responses(
        (status = 200, description = "Featured projects", body = ProjectPage),
        (status = 400, description = "Invalid pagination", body = crate::error::ErrorBody),
    ),
    tag = "projects"
)]
pub(crate) async fn list_featured(
    State(state): State<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<ProjectPage>, AppError> {
    let started = Instant::now();
    let q = extract_query(query)?;
    let results = state
        .projects
        .list_featured(Utc::now(), q.page, q.limit)
        .await?;
    Ok(Json(ProjectPage::new(results, started)))
}

/// POST /v1/projects: create a draft owned by the caller.
#[utoipa::path(
    post,
    path = "/v1/projects",
    request_body = NewProject,
    responses(
        (status = 201, description = "Draft created", body = ProjectRecord),
        (status = 401, description = "Authentication required", body = crate::error::ErrorBody),
        (status = 409, description = "Title or slug already taken", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "projects"
)]
pub(crate) async fn create_project(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<NewProject>, JsonRejection>,
) -> Result<(StatusCode, Json<ProjectRecord>), AppError> {
    let input = extract_json(body)?;
    let project = state
        .projects
        .create_draft(input, caller.principal())
        .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /v1/projects/:id: fetch a project the caller may read.
#[utoipa::path(
    get,
    path = "/v1/projects/{id}",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project found", body = ProjectRecord),
        (status = 401, description = "Authentication required", body = crate::error::ErrorBody),
        (status = 403, description = "Not readable by caller", body = crate::error::ErrorBody),
        (status = 404, description = "Project not found", body = crate::error::ErrorBody),
    ),
    tag = "projects"
)]
pub(crate) async fn get_project(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ProjectRecord>, AppError> {
    let id = extract_path(id)?;
    let project = state.projects.get_by_id(id, caller.principal()).await?;
    Ok(Json(project))
}

/// GET /v1/projects/slug/:slug: fetch a project by slug, ignoring case.
#[utoipa::path(
    get,
    path = "/v1/projects/slug/{slug}",
    params(("slug" = String, Path, description = "Project slug")),
    responses(
        (status = 200, description = "Project found", body = ProjectRecord),
        (status = 403, description = "Not readable by caller", body = crate::error::ErrorBody),
        (status = 404, description = "Project not found", body = crate::error::ErrorBody),
    ),
    tag = "projects"
)]
pub(crate) async fn get_project_by_slug(
    State(state): State<AppState>,
    caller: Caller,
    Path(slug): Path<String>,
) -> Result<Json<ProjectRecord>, AppError> {
    let project = state.projects.get_by_slug(&slug, caller.principal()).await?;
    Ok(Json(project))
}

/// PATCH /v1/projects/:id: edit content. A live project returns to draft.
#[utoipa::path(
    patch,
    path = "/v1/projects/{id}",
    params(("id" = Uuid, Path, description = "Project ID")),
    request_body = ContentEdit,
    responses(
        (status = 200, description = "Project updated", body = EditOutcome),
        (status = 401, description = "Authentication required", body = crate::error::ErrorBody),
        (status = 403, description = "Caller is not the owner", body = crate::error::ErrorBody),
        (status = 404, description = "Project not found", body = crate::error::ErrorBody),
        (status = 409, description = "Title or slug already taken", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "projects"
)]
pub(crate) async fn update_project(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ContentEdit>, JsonRejection>,
) -> Result<Json<EditOutcome>, AppError> {
    let id = extract_path(id)?;
    let edit = extract_json(body)?;
    let outcome = state
        .projects
        .update_content(id, edit, caller.principal())
        .await?;
    Ok(Json(outcome))
}

/// DELETE /v1/projects/:id: delete a project and its versions.
#[utoipa::path(
    delete,
    path = "/v1/projects/{id}",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 403, description = "Caller is not the owner", body = crate::error::ErrorBody),
        (status = 404, description = "Project not found", body = crate::error::ErrorBody),
    ),
    tag = "projects"
)]
pub(crate) async fn delete_project(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let id = extract_path(id)?;
    state.projects.delete(id, caller.principal()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /v1/projects/:id/status: request a status change.
#[utoipa::path(
    put,
    path = "/v1/projects/{id}/status",
    params(("id" = Uuid, Path, description = "Project ID")),
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Status changed", body = TransitionOutcome),
        (status = 400, description = "Unknown status", body = crate::error::ErrorBody),
        (status = 403, description = "Not permitted", body = crate::error::ErrorBody),
        (status = 404, description = "Project not found", body = crate::error::ErrorBody),
        (status = 409, description = "Invalid transition", body = crate::error::ErrorBody),
    ),
    tag = "projects"
)]
pub(crate) async fn change_status(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<TransitionOutcome>, AppError> {
    let id = extract_path(id)?;
    let req = extract_validated_json(body)?;
    let outcome = state
        .projects
        .transition(id, &req.status, caller.principal())
        .await?;
    Ok(Json(outcome))
}

/// PUT /v1/projects/:id/feature: feature a project. Staff only.
#[utoipa::path(
    put,
    path = "/v1/projects/{id}/feature",
    params(("id" = Uuid, Path, description = "Project ID")),
    request_body = FeatureRequest,
    responses(
        (status = 200, description = "Project featured", body = ProjectRecord),
        (status = 403, description = "Staff role required", body = crate::error::ErrorBody),
        (status = 422, description = "Duration out of range", body = crate::error::ErrorBody),
    ),
    tag = "projects"
)]
pub(crate) async fn feature_project(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<FeatureRequest>, JsonRejection>,
) -> Result<Json<ProjectRecord>, AppError> {
    let id = extract_path(id)?;
    let req = extract_json(body)?;
    let project = state
        .projects
        .feature(id, req.days, caller.principal())
        .await?;
    Ok(Json(project))
}

/// DELETE /v1/projects/:id/feature: clear the featured window. Staff only.
#[utoipa::path(
    delete,
    path = "/v1/projects/{id}/feature",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Featured window cleared", body = ProjectRecord),
        (status = 403, description = "Staff role required", body = crate::error::ErrorBody),
    ),
    tag = "projects"
)]
pub(crate) async fn unfeature_project(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ProjectRecord>, AppError> {
    let id = extract_path(id)?;
    let project = state.projects.unfeature(id, caller.principal()).await?;
    Ok(Json(project))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app() -> Router<()> {
        router().with_state(AppState::new())
    }

    async fn body_json<T: serde::de::DeserializeOwned>(resp: axum::response::Response) -> T {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn handler_list_empty_returns_200() {
        let resp = test_app()
            .oneshot(Request::get("/v1/projects").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let page: ProjectPage = body_json(resp).await;
        assert_eq!(page.count, 0);
        assert!(page.results.is_empty());
    }

    #[tokio::test]
    async fn handler_list_negative_page_returns_400() {
        let resp = test_app()
            .oneshot(
                Request::get("/v1/projects?page=-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn handler_search_oversized_limit_returns_400() {
        let resp = test_app()
            .oneshot(
                Request::get("/v1/projects/search?q=foo&limit=101")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn handler_create_anonymous_returns_401() {
        let req = Request::post("/v1/projects")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"title":"Foo","slug":"foo"}"#))
            .unwrap();
        let resp = test_app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn handler_create_anonymous_invalid_slug_returns_401() {
        let req = Request::post("/v1/projects")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"title":"Foo","slug":"Not ok"}"#))
            .unwrap();
        let resp = test_app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn handler_featured_negative_page_returns_400() {
        let resp = test_app()
            .oneshot(
                Request::get("/v1/projects/featured?page=-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn handler_get_malformed_id_returns_400() {
        let resp = test_app()
            .oneshot(
                Request::get("/v1/projects/not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn handler_get_missing_returns_404() {
        let uri = format!("/v1/projects/{}", Uuid::new_v4());
        let resp = test_app()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
