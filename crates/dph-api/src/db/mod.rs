//! # Database Persistence Layer
//!
//! PostgreSQL persistence via SQLx.
//!
//! ## Architecture
//!
//! The database layer is **optional**. When `DATABASE_URL` is set, the API
//! persists projects, versions and accounts to PostgreSQL. When absent, the
//! API runs against the in-memory store (suitable for development and
//! testing).
//!
//! The submodules are free functions over any [`sqlx::PgExecutor`], so the
//! same query runs against the pool or inside a transaction. Transaction
//! boundaries are owned by [`crate::store::postgres::PgStore`].
//!
//! Uniqueness of project titles, slugs and usernames is enforced by
//! case-insensitive unique indexes; violations surface as
//! [`StoreError::Conflict`].

pub mod projects;
pub mod users;
pub mod versions;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::state::AppConfig;
use crate::store::StoreError;

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if no database URL is configured (in-memory mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool(config: &AppConfig) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!(
            "DATABASE_URL not set, running in-memory only mode. \
             State will not survive restarts."
        );
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    // Run embedded migrations.
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Map a driver error onto the store taxonomy.
///
/// Unique-index violations become `Conflict`, named after the index that
/// fired. Everything else is an opaque backend failure.
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                let what = match db.constraint() {
                    Some("projects_title_lower_key") => "another project shares that title",
                    Some("projects_slug_lower_key") => "another project shares that slug",
                    Some("users_username_lower_key") => "that username is already taken",
                    _ => "a unique constraint was violated",
                };
                return StoreError::Conflict(what.to_string());
            }
        }
        StoreError::Backend(err.to_string())
    }
}
