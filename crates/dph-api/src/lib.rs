//! # dph-api: HTTP Service for the Data-Pack Host
//!
//! Serves project discovery, authoring, moderation and downloads over a
//! JSON API. Every project read and mutation passes through the
//! visibility policy in `dph-core` and the lifecycle machine in
//! `dph-state`.
//!
//! ## API Surface
//!
//! | Prefix                         | Module                | Domain              |
//! |--------------------------------|-----------------------|---------------------|
//! | `/v1/projects/*`               | [`routes::projects`]  | Projects            |
//! | `/v1/projects/:id/versions/*`  | [`routes::versions`]  | Versions, downloads |
//! | `/v1/admin/*`                  | [`routes::admin`]     | Moderation          |
//! | `/v1/users/*`                  | [`routes::users`]     | Accounts            |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → RateLimitMiddleware → IdentityMiddleware → Handler
//! ```
//!
//! ## Persistence
//!
//! [`store::ProjectStore`] and [`store::UserStore`] have an in-memory
//! implementation and a PostgreSQL one. `DATABASE_URL` selects the latter.

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::middleware::rate_limit::RateLimiter;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) sit outside identity resolution and rate
/// limiting so orchestrators can always reach them.
pub fn app(state: AppState) -> Router {
    let limiter = RateLimiter::new(state.config.rate_limit.clone());

    let api = Router::new()
        .merge(routes::projects::router())
        .merge(routes::versions::router())
        .merge(routes::admin::router())
        .merge(routes::users::router())
        .merge(openapi::router())
        .layer(from_fn_with_state(state.clone(), auth::identity_middleware))
        .layer(from_fn(middleware::rate_limit::rate_limit_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(limiter))
        .with_state(state.clone());

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .with_state(state);

    Router::new().merge(health).merge(api)
}

/// Liveness probe: 200 while the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. With a database configured, it must answer a ping.
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!(error = %e, "readiness check failed: database unreachable");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unavailable");
        }
    }
    (StatusCode::OK, "ready")
}
