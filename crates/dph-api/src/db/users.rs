//! Account persistence operations.

use chrono::{DateTime, Utc};
use dph_core::Role;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::state::UserRecord;
use crate::store::StoreError;

const USER_COLUMNS: &str = "id, username, role, bio, badges, icon, joined_at, password_hash, token";

pub async fn insert<'e>(exec: impl PgExecutor<'e>, record: &UserRecord) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO users (id, username, role, bio, badges, icon, joined_at, password_hash, token)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(record.id)
    .bind(&record.username)
    .bind(record.role.as_str())
    .bind(&record.bio)
    .bind(&record.badges)
    .bind(&record.icon)
    .bind(record.joined_at)
    .bind(&record.password_hash)
    .bind(&record.token)
    .execute(exec)
    .await?;

    Ok(())
}

pub async fn get_by_id<'e>(
    exec: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<UserRecord>, StoreError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(exec)
    .await?;

    row.map(UserRow::into_record).transpose()
}

/// Look up the account a bearer token belongs to.
///
/// The equality check runs inside PostgreSQL against the unique token
/// index.
pub async fn get_by_token<'e>(
    exec: impl PgExecutor<'e>,
    token: &str,
) -> Result<Option<UserRecord>, StoreError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE token = $1"
    ))
    .bind(token)
    .fetch_optional(exec)
    .await?;

    row.map(UserRow::into_record).transpose()
}

/// Users holding `role`, earliest joined first.
pub async fn list_by_role<'e>(
    exec: impl PgExecutor<'e>,
    role: Role,
) -> Result<Vec<UserRecord>, StoreError> {
    let rows = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE role = $1 ORDER BY joined_at ASC, id ASC"
    ))
    .bind(role.as_str())
    .fetch_all(exec)
    .await?;

    rows.into_iter().map(UserRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    role: String,
    bio: String,
    badges: Vec<String>,
    icon: Option<String>,
    joined_at: DateTime<Utc>,
    password_hash: String,
    token: String,
}

impl UserRow {
    fn into_record(self) -> Result<UserRecord, StoreError> {
        let role = self
            .role
            .parse::<Role>()
            .map_err(|e| StoreError::IllegalStoredState {
                entity: "user",
                id: self.id,
                field: "role",
                value: e.0,
            })?;

        Ok(UserRecord {
            id: self.id,
            username: self.username,
            role,
            bio: self.bio,
            badges: self.badges,
            icon: self.icon,
            joined_at: self.joined_at,
            password_hash: self.password_hash,
            token: self.token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(role: &str) -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            role: role.to_string(),
            bio: String::new(),
            badges: Vec::new(),
            icon: None,
            joined_at: Utc::now(),
            password_hash: "hash".to_string(),
            token: "token".to_string(),
        }
    }

    #[test]
    fn decodes_role() {
        assert_eq!(row("moderator").into_record().unwrap().role, Role::Moderator);
    }

    #[test]
    fn unknown_role_is_illegal_stored_state() {
        let err = row("owner").into_record().unwrap_err();
        assert!(matches!(
            err,
            StoreError::IllegalStoredState { field: "role", .. }
        ));
    }
}
