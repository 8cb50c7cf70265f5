//! # OpenAPI Document Assembly
//!
//! Collects every utoipa-documented handler into one OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI document for the whole API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "DPH API",
        version = "0.1.0",
        description = "Data-pack hosting: project lifecycle, visibility control, versions and moderation.",
        license(name = "AGPL-3.0-or-later")
    ),
    paths(
        // Projects
        crate::routes::projects::list_projects,
        crate::routes::projects::search_projects,
        crate::routes::projects::list_featured,
        crate::routes::projects::create_project,
        crate::routes::projects::get_project,
        crate::routes::projects::get_project_by_slug,
        crate::routes::projects::update_project,
        crate::routes::projects::delete_project,
        crate::routes::projects::change_status,
        crate::routes::projects::feature_project,
        crate::routes::projects::unfeature_project,
        // Versions
        crate::routes::versions::list_versions,
        crate::routes::versions::create_version,
        crate::routes::versions::get_version,
        crate::routes::versions::download_version,
        // Moderation
        crate::routes::admin::review_queue,
        // Users
        crate::routes::users::register,
        crate::routes::users::me,
        crate::routes::users::staff,
        crate::routes::users::get_user,
        crate::routes::users::projects_by_user,
    ),
    components(schemas(
        crate::state::ProjectRecord,
        crate::state::VersionRecord,
        crate::state::UserRecord,
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::ProjectPage,
        crate::service::projects::NewProject,
        crate::service::projects::ContentEdit,
        crate::service::projects::NewVersion,
        crate::service::projects::TransitionOutcome,
        crate::service::projects::EditOutcome,
        crate::routes::projects::StatusRequest,
        crate::routes::projects::FeatureRequest,
        crate::routes::versions::DownloadResponse,
        crate::routes::users::RegisterRequest,
        crate::routes::users::RegisterResponse,
        crate::routes::users::StaffResponse,
    )),
    tags(
        (name = "projects", description = "Project listing, lookup, editing and lifecycle"),
        (name = "versions", description = "Versions and downloads"),
        (name = "admin", description = "Moderation review queue"),
        (name = "users", description = "Accounts and staff listings"),
    )
)]
pub struct ApiDoc;

/// Serves the generated document at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_lifecycle_paths() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/v1/projects",
            "/v1/projects/{id}/status",
            "/v1/projects/{id}/versions/{index}/download",
            "/v1/admin/review",
            "/v1/users/{id}/projects",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn document_serializes() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert_eq!(json["info"]["title"], "DPH API");
        assert!(json["components"]["schemas"]["ProjectRecord"].is_object());
    }
}
