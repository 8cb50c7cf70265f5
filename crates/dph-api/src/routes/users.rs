//! # Account API
//!
//! Registration returns the bearer token exactly once. Password hashes and
//! tokens are never serialized anywhere else.

use std::time::Instant;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{PageQuery, ProjectPage};
use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::{extract_path, extract_query, extract_validated_json, first_failure, Validate};
use crate::state::{AppState, UserRecord};

// ── DTOs ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub bio: Option<String>,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), String> {
        use dph_core::validation::{validate_password, validate_username};
        first_failure([
            validate_username(&self.username),
            validate_password(&self.password),
        ])
    }
}

/// The new account and its bearer token. The token is not retrievable
/// later.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub user: UserRecord,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StaffResponse {
    pub count: usize,
    pub users: Vec<UserRecord>,
}

// ── Router ──────────────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/users", post(register))
        .route("/v1/users/me", get(me))
        .route("/v1/users/staff/:role", get(staff))
        .route("/v1/users/:id", get(get_user))
        .route("/v1/users/:id/projects", get(projects_by_user))
}

// ── Handlers ────────────────────────────────────────────────────────────────

/// POST /v1/users: create an account.
#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 409, description = "Username taken", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub(crate) async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let reg = state
        .accounts
        .register(&req.username, &req.password, req.bio)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: reg.user,
            token: reg.token,
        }),
    ))
}

/// GET /v1/users/me: the caller's account.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    responses(
        (status = 200, description = "Caller's account", body = UserRecord),
        (status = 401, description = "Authentication required", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub(crate) async fn me(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<UserRecord>, AppError> {
    Ok(Json(state.accounts.me(caller.principal()).await?))
}

/// GET /v1/users/staff/:role: members of a staff role.
#[utoipa::path(
    get,
    path = "/v1/users/staff/{role}",
    params(("role" = String, Path, description = "helper, moderator or admin")),
    responses(
        (status = 200, description = "Staff members", body = StaffResponse),
        (status = 400, description = "Not a staff role", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub(crate) async fn staff(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> Result<Json<StaffResponse>, AppError> {
    let users = state.accounts.staff(&role).await?;
    Ok(Json(StaffResponse {
        count: users.len(),
        users,
    }))
}

/// GET /v1/users/:id
#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Account found", body = UserRecord),
        (status = 404, description = "No such user", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub(crate) async fn get_user(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<UserRecord>, AppError> {
    let id = extract_path(id)?;
    Ok(Json(state.accounts.get_user(id).await?))
}

/// GET /v1/users/:id/projects: an owner's projects. `me` names the caller.
#[utoipa::path(
    get,
    path = "/v1/users/{id}/projects",
    params(
        ("id" = String, Path, description = "User ID, or `me`"),
        PageQuery,
    ),
    responses(
        (status = 200, description = "Projects visible to the caller", body = ProjectPage),
        (status = 401, description = "`me` used without credentials", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub(crate) async fn projects_by_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<ProjectPage>, AppError> {
    let started = Instant::now();
    let q = extract_query(query)?;
    let owner = if id.eq_ignore_ascii_case("me") {
        caller
            .principal()
            .map(|p| p.id.0)
            .ok_or_else(|| AppError::Unauthorized("authentication required".into()))?
    } else {
        id.parse::<Uuid>()
            .map_err(|e| AppError::BadRequest(format!("invalid user id: {e}")))?
    };
    let results = state
        .projects
        .list_by_owner(owner, caller.principal(), q.page, q.limit)
        .await?;
    Ok(Json(ProjectPage::new(results, started)))
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

    fn register_request(username: &str) -> Request<Body> {
        Request::post("/v1/users")
            .header("content-type", "application/json")
            .body(Body::from(format!(
                r#"{{"username":"{username}","password":"correct-horse"}}"#
            )))
            .unwrap()
    }

    #[tokio::test]
    async fn handler_register_returns_201_with_token() {
        let resp = test_app().oneshot(register_request("alice")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: serde_json::Value = body_json(resp).await;
        assert_eq!(body["user"]["username"], "alice");
        assert_eq!(body["user"]["role"], "default");
        assert!(body["token"].as_str().unwrap().len() > 8);
        assert!(body["user"].get("password_hash").is_none());
        assert!(body["user"].get("token").is_none());
    }

    #[tokio::test]
    async fn handler_register_duplicate_returns_409() {
        let app = test_app();
        let first = app.clone().oneshot(register_request("alice")).await.unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);
        let second = app.oneshot(register_request("Alice")).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn handler_staff_unknown_role_returns_400() {
        let resp = test_app()
            .oneshot(Request::get("/v1/users/staff/wizard").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn handler_my_projects_anonymous_returns_401() {
        let resp = test_app()
            .oneshot(Request::get("/v1/users/me/projects").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
