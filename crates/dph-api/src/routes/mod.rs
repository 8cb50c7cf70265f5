//! # API Route Modules
//!
//! - `projects`: listing, search, featured, lookup, content edits, status
//!   transitions, featuring and deletion.
//! - `versions`: version listing, creation, lookup and download.
//! - `admin`: the moderation review queue.
//! - `users`: registration, account lookup, staff listings and per-owner
//!   project listings.
//!
//! Handlers are thin: they extract and validate input, hand the caller's
//! identity to a service, and map [`crate::service::ServiceError`] to
//! [`crate::error::AppError`].

pub mod admin;
pub mod projects;
pub mod users;
pub mod versions;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::state::ProjectRecord;

/// `page` and `limit` query parameters, validated by the service.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Zero-based page number.
    pub page: Option<i64>,
    /// Page size.
    pub limit: Option<i64>,
}

/// A page of projects.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProjectPage {
    /// Time spent producing the page, in seconds.
    pub time: f64,
    pub count: usize,
    pub results: Vec<ProjectRecord>,
}

impl ProjectPage {
    pub(crate) fn new(results: Vec<ProjectRecord>, started: std::time::Instant) -> Self {
        Self {
            time: started.elapsed().as_secs_f64(),
            count: results.len(),
            results,
        }
    }
}
