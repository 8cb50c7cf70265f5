//! Version persistence operations.

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::state::VersionRecord;
use crate::store::StoreError;

const VERSION_COLUMNS: &str = "id, project_id, title, description, version_code, supports, \
     downloads, download_link, resource_pack_link, created_at";

/// Insert a new version row.
pub async fn insert<'e>(exec: impl PgExecutor<'e>, record: &VersionRecord) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO versions (id, project_id, title, description, version_code, supports,
                               downloads, download_link, resource_pack_link, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(record.id)
    .bind(record.project_id)
    .bind(&record.title)
    .bind(&record.description)
    .bind(&record.version_code)
    .bind(&record.supports)
    .bind(record.downloads)
    .bind(&record.download_link)
    .bind(&record.resource_pack_link)
    .bind(record.created_at)
    .execute(exec)
    .await?;

    Ok(())
}

/// All versions of a project in creation order.
pub async fn list_for_project<'e>(
    exec: impl PgExecutor<'e>,
    project_id: Uuid,
) -> Result<Vec<VersionRecord>, StoreError> {
    let rows = sqlx::query_as::<_, VersionRow>(&format!(
        "SELECT {VERSION_COLUMNS} FROM versions
         WHERE project_id = $1
         ORDER BY created_at ASC, id ASC"
    ))
    .bind(project_id)
    .fetch_all(exec)
    .await?;

    Ok(rows.into_iter().map(VersionRow::into_record).collect())
}

/// Increment a version's download counter and return the updated row.
pub async fn increment_downloads<'e>(
    exec: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<VersionRecord>, StoreError> {
    let row = sqlx::query_as::<_, VersionRow>(&format!(
        "UPDATE versions SET downloads = downloads + 1 WHERE id = $1 RETURNING {VERSION_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(exec)
    .await?;

    Ok(row.map(VersionRow::into_record))
}

/// Remove every version of a project. Returns how many rows went.
pub async fn delete_for_project<'e>(
    exec: impl PgExecutor<'e>,
    project_id: Uuid,
) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM versions WHERE project_id = $1")
        .bind(project_id)
        .execute(exec)
        .await?;
    Ok(result.rows_affected())
}

#[derive(sqlx::FromRow)]
struct VersionRow {
    id: Uuid,
    project_id: Uuid,
    title: String,
    description: String,
    version_code: String,
    supports: Vec<String>,
    downloads: i64,
    download_link: String,
    resource_pack_link: Option<String>,
    created_at: DateTime<Utc>,
}

impl VersionRow {
    fn into_record(self) -> VersionRecord {
        VersionRecord {
            id: self.id,
            project_id: self.project_id,
            title: self.title,
            description: self.description,
            version_code: self.version_code,
            supports: self.supports,
            downloads: self.downloads,
            download_link: self.download_link,
            resource_pack_link: self.resource_pack_link,
            created_at: self.created_at,
        }
    }
}
