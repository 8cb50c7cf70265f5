//! # Version API
//!
//! Versions are addressed by their zero-based creation ordinal or by
//! `latest`. Access follows the parent project's visibility.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_path};
use crate::service::projects::NewVersion;
use crate::state::{AppState, VersionRecord};

/// Where to fetch a version's files. File storage is external.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadResponse {
    pub version: VersionRecord,
    pub download_link: String,
    pub resource_pack_link: Option<String>,
    /// Whether this download was counted. Only live projects count.
    pub counted: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/projects/:id/versions",
            get(list_versions).post(create_version),
        )
        .route("/v1/projects/:id/versions/:index", get(get_version))
        .route(
            "/v1/projects/:id/versions/:index/download",
            get(download_version),
        )
}

/// GET /v1/projects/:id/versions
#[utoipa::path(
    get,
    path = "/v1/projects/{id}/versions",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Versions, oldest first", body = Vec<VersionRecord>),
        (status = 403, description = "Project not readable by caller", body = crate::error::ErrorBody),
        (status = 404, description = "Project not found", body = crate::error::ErrorBody),
    ),
    tag = "versions"
)]
pub(crate) async fn list_versions(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<VersionRecord>>, AppError> {
    let id = extract_path(id)?;
    let versions = state.projects.list_versions(id, caller.principal()).await?;
    Ok(Json(versions))
}

/// POST /v1/projects/:id/versions
#[utoipa::path(
    post,
    path = "/v1/projects/{id}/versions",
    params(("id" = Uuid, Path, description = "Project ID")),
    request_body = NewVersion,
    responses(
        (status = 201, description = "Version created", body = VersionRecord),
        (status = 401, description = "Authentication required", body = crate::error::ErrorBody),
        (status = 403, description = "Caller is not the owner", body = crate::error::ErrorBody),
        (status = 404, description = "Project not found", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "versions"
)]
pub(crate) async fn create_version(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<NewVersion>, JsonRejection>,
) -> Result<(StatusCode, Json<VersionRecord>), AppError> {
    let id = extract_path(id)?;
    let input = extract_json(body)?;
    let version = state
        .projects
        .create_version(id, input, caller.principal())
        .await?;
    Ok((StatusCode::CREATED, Json(version)))
}

/// GET /v1/projects/:id/versions/:index
#[utoipa::path(
    get,
    path = "/v1/projects/{id}/versions/{index}",
    params(
        ("id" = Uuid, Path, description = "Project ID"),
        ("index" = String, Path, description = "Creation ordinal or `latest`"),
    ),
    responses(
        (status = 200, description = "Version found", body = VersionRecord),
        (status = 400, description = "Invalid selector", body = crate::error::ErrorBody),
        (status = 404, description = "No such version", body = crate::error::ErrorBody),
    ),
    tag = "versions"
)]
pub(crate) async fn get_version(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<(Uuid, String)>, PathRejection>,
) -> Result<Json<VersionRecord>, AppError> {
    let (id, index) = extract_path(path)?;
    let version = state
        .projects
        .get_version(id, &index, caller.principal())
        .await?;
    Ok(Json(version))
}

/// GET /v1/projects/:id/versions/:index/download
#[utoipa::path(
    get,
    path = "/v1/projects/{id}/versions/{index}/download",
    params(
        ("id" = Uuid, Path, description = "Project ID"),
        ("index" = String, Path, description = "Creation ordinal or `latest`"),
    ),
    responses(
        (status = 200, description = "Download resolved", body = DownloadResponse),
        (status = 403, description = "Project not readable by caller", body = crate::error::ErrorBody),
        (status = 404, description = "No such version", body = crate::error::ErrorBody),
    ),
    tag = "versions"
)]
pub(crate) async fn download_version(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<(Uuid, String)>, PathRejection>,
) -> Result<Json<DownloadResponse>, AppError> {
    let (id, index) = extract_path(path)?;
    let outcome = state
        .projects
        .download(id, &index, caller.principal())
        .await?;
    Ok(Json(DownloadResponse {
        download_link: outcome.version.download_link.clone(),
        resource_pack_link: outcome.version.resource_pack_link.clone(),
        counted: outcome.counted,
        version: outcome.version,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_app() -> Router<()> {
        router().with_state(AppState::new())
    }

    #[tokio::test]
    async fn handler_list_missing_project_returns_404() {
        let uri = format!("/v1/projects/{}/versions", Uuid::new_v4());
        let resp = test_app()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn handler_bad_selector_returns_400() {
        let uri = format!("/v1/projects/{}/versions/first/download", Uuid::new_v4());
        let resp = test_app()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn handler_create_anonymous_returns_401() {
        let uri = format!("/v1/projects/{}/versions", Uuid::new_v4());
        let body = r#"{"title":"Release","version_code":"1.0.0","supports":["1.20.4"],"download_link":"/files/a.zip"}"#;
        let req = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let resp = test_app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
