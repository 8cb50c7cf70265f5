//! # Moderation API
//!
//! The review queue of pending projects. Approval, rejection and takedown
//! go through `PUT /v1/projects/:id/status` like every other transition.

use std::time::Instant;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};

use super::{PageQuery, ProjectPage};
use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::extract_query;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/admin/review", get(review_queue))
}

/// GET /v1/admin/review: pending projects, least recently updated first.
#[utoipa::path(
    get,
    path = "/v1/admin/review",
    params(PageQuery),
    responses(
        (status = 200, description = "Pending projects", body = ProjectPage),
        (status = 401, description = "Authentication required", body = crate::error::ErrorBody),
        (status = 403, description = "Staff role required", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
pub(crate) async fn review_queue(
    State(state): State<AppState>,
    caller: Caller,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<ProjectPage>, AppError> {
    let started = Instant::now();
    let q = extract_query(query)?;
    let results = state
        .projects
        .review_queue(caller.principal(), q.page, q.limit)
        .await?;
    Ok(Json(ProjectPage::new(results, started)))
}
