//! Project persistence operations.
//!
//! Lifecycle constraints are enforced at the application layer (via
//! `dph_state`), not in SQL. Rows are locked with `FOR UPDATE` by callers
//! that intend to validate and write inside one transaction.

use chrono::{DateTime, Utc};
use dph_core::{PageRequest, ProjectStatus};
use sqlx::{PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::state::ProjectRecord;
use crate::store::{ProjectFilter, ProjectOrder, StoreError};

const PROJECT_COLUMNS: &str = "id, owner_id, title, slug, description, body, status, downloads, \
     featured_until, category, icon, license, created_at, updated_at";

/// Insert a new project row.
pub async fn insert<'e>(exec: impl PgExecutor<'e>, record: &ProjectRecord) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO projects (id, owner_id, title, slug, description, body, status, downloads,
                               featured_until, category, icon, license, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
    )
    .bind(record.id)
    .bind(record.owner_id)
    .bind(&record.title)
    .bind(&record.slug)
    .bind(&record.description)
    .bind(&record.body)
    .bind(record.status.as_str())
    .bind(record.downloads)
    .bind(record.featured_until)
    .bind(&record.category)
    .bind(&record.icon)
    .bind(&record.license)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(exec)
    .await?;

    Ok(())
}

/// Fetch a project by ID.
pub async fn get_by_id<'e>(
    exec: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<ProjectRecord>, StoreError> {
    let row = sqlx::query_as::<_, ProjectRow>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(exec)
    .await?;

    row.map(ProjectRow::into_record).transpose()
}

/// Fetch and row-lock a project for the rest of the enclosing transaction.
pub async fn get_for_update<'e>(
    exec: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<ProjectRecord>, StoreError> {
    let row = sqlx::query_as::<_, ProjectRow>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(exec)
    .await?;

    row.map(ProjectRow::into_record).transpose()
}

/// Fetch a project by slug, ignoring case.
pub async fn get_by_slug<'e>(
    exec: impl PgExecutor<'e>,
    slug: &str,
) -> Result<Option<ProjectRecord>, StoreError> {
    let row = sqlx::query_as::<_, ProjectRow>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE LOWER(slug) = LOWER($1)"
    ))
    .bind(slug)
    .fetch_optional(exec)
    .await?;

    row.map(ProjectRow::into_record).transpose()
}

/// Escape `%`, `_` and `\` so user text matches literally inside `LIKE`.
fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// List projects matching `filter`, one page at a time.
pub async fn list<'e>(
    exec: impl PgExecutor<'e>,
    filter: &ProjectFilter,
    page: PageRequest,
) -> Result<Vec<ProjectRecord>, StoreError> {
    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE TRUE"));

    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(owner) = filter.owner_id {
        qb.push(" AND owner_id = ").push_bind(owner);
    }
    if let Some(now) = filter.featured_at {
        qb.push(" AND featured_until > ").push_bind(now);
    }
    if let Some(text) = &filter.text {
        let pattern = like_pattern(text);
        qb.push(" AND (LOWER(title) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(description) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(slug) LIKE ")
            .push_bind(pattern)
            .push(")");
    }

    qb.push(match filter.order {
        ProjectOrder::MostDownloaded => " ORDER BY downloads DESC, created_at DESC, id ASC",
        ProjectOrder::OldestUpdated => " ORDER BY updated_at ASC, id ASC",
    });
    qb.push(" LIMIT ")
        .push_bind(i64::from(page.limit))
        .push(" OFFSET ")
        .push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));

    let rows = qb.build_query_as::<ProjectRow>().fetch_all(exec).await?;
    rows.into_iter().map(ProjectRow::into_record).collect()
}

/// Write every mutable column of a project back.
pub async fn update<'e>(exec: impl PgExecutor<'e>, record: &ProjectRecord) -> Result<bool, StoreError> {
    let result = sqlx::query(
        "UPDATE projects SET title = $1, slug = $2, description = $3, body = $4, status = $5,
                             featured_until = $6, category = $7, icon = $8, license = $9,
                             updated_at = $10
         WHERE id = $11",
    )
    .bind(&record.title)
    .bind(&record.slug)
    .bind(&record.description)
    .bind(&record.body)
    .bind(record.status.as_str())
    .bind(record.featured_until)
    .bind(&record.category)
    .bind(&record.icon)
    .bind(&record.license)
    .bind(record.updated_at)
    .bind(record.id)
    .execute(exec)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Stamp `updated_at`.
pub async fn touch<'e>(
    exec: impl PgExecutor<'e>,
    id: Uuid,
    at: DateTime<Utc>,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE projects SET updated_at = $1 WHERE id = $2")
        .bind(at)
        .bind(id)
        .execute(exec)
        .await?;
    Ok(())
}

/// Increment the download counter relative to the stored value.
///
/// Only live projects count. Returns the new counter, or `None` when the
/// row is missing or not live.
pub async fn increment_downloads<'e>(
    exec: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<i64>, StoreError> {
    let downloads: Option<i64> = sqlx::query_scalar(
        "UPDATE projects SET downloads = downloads + 1
         WHERE id = $1 AND status = $2
         RETURNING downloads",
    )
    .bind(id)
    .bind(ProjectStatus::Live.as_str())
    .fetch_optional(exec)
    .await?;

    Ok(downloads)
}

/// Delete a project row. Versions go with it via `ON DELETE CASCADE`.
pub async fn delete<'e>(exec: impl PgExecutor<'e>, id: Uuid) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(id)
        .execute(exec)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    slug: String,
    description: String,
    body: String,
    status: String,
    downloads: i64,
    featured_until: Option<DateTime<Utc>>,
    category: Vec<String>,
    icon: Option<String>,
    license: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProjectRow {
    fn into_record(self) -> Result<ProjectRecord, StoreError> {
        let status = self
            .status
            .parse::<ProjectStatus>()
            .map_err(|e| StoreError::IllegalStoredState {
                entity: "project",
                id: self.id,
                field: "status",
                value: e.0,
            })?;

        Ok(ProjectRecord {
            id: self.id,
            owner_id: self.owner_id,
            title: self.title,
            slug: self.slug,
            description: self.description,
            body: self.body,
            status,
            downloads: self.downloads,
            featured_until: self.featured_until,
            category: self.category,
            icon: self.icon,
            license: self.license,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> ProjectRow {
        let now = Utc::now();
        ProjectRow {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: "Foo".to_string(),
            slug: "foo".to_string(),
            description: String::new(),
            body: String::new(),
            status: status.to_string(),
            downloads: 3,
            featured_until: None,
            category: vec!["worldgen".to_string()],
            icon: None,
            license: Some("MIT".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn decodes_known_status() {
        let record = row("pending").into_record().unwrap();
        assert_eq!(record.status, ProjectStatus::Pending);
        assert_eq!(record.downloads, 3);
    }

    #[test]
    fn unknown_status_is_illegal_stored_state() {
        let err = row("archived").into_record().unwrap_err();
        match err {
            StoreError::IllegalStoredState { field, value, .. } => {
                assert_eq!(field, "status");
                assert_eq!(value, "archived");
            }
            other => panic!("expected IllegalStoredState, got {other:?}"),
        }
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Caves"), "%caves%");
        assert_eq!(like_pattern("100%_done"), "%100\\%\\_done%");
    }
}
