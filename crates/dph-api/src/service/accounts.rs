//! Account registration, lookup, and credential resolution.

use std::sync::Arc;

use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use dph_core::validation::{validate_bio, validate_password, validate_username};
use dph_core::{parse_credential, CredentialError, Principal, Role};
use rand_core::{OsRng, RngCore};
use uuid::Uuid;

use super::ServiceError;
use crate::state::UserRecord;
use crate::store::UserStore;

/// Random bytes per issued token, before encoding.
const TOKEN_BYTES: usize = 64;

const DEFAULT_BIO: &str = "A new user!";

/// A freshly registered account and its token. The token is only ever
/// returned here.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: UserRecord,
    pub token: String,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
}

impl std::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountService").finish_non_exhaustive()
    }
}

fn issue_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::Internal(format!("password hashing failed: {e}")))
}

/// Argon2 is CPU-bound; run it off the async workers.
async fn hash_password_blocking(password: &str) -> Result<String, ServiceError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::Internal(format!("password hashing task failed: {e}")))?
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Create an account with the `default` role.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        bio: Option<String>,
    ) -> Result<Registration, ServiceError> {
        validate_username(username)?;
        validate_password(password)?;
        let bio = bio.unwrap_or_else(|| DEFAULT_BIO.to_string());
        validate_bio(&bio)?;

        let password_hash = hash_password_blocking(password).await?;
        let token = issue_token();
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: username.to_string(),
            role: Role::Default,
            bio,
            badges: Vec::new(),
            icon: None,
            joined_at: Utc::now(),
            password_hash,
            token: token.clone(),
        };

        let user = self.users.insert_user(user).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(Registration { user, token })
    }

    pub async fn get_user(&self, id: Uuid) -> Result<UserRecord, ServiceError> {
        self.users
            .user_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {id} not found")))
    }

    /// The caller's own account.
    pub async fn me(&self, principal: Option<&Principal>) -> Result<UserRecord, ServiceError> {
        let principal = dph_core::require_principal(principal)?;
        self.get_user(principal.id.0).await
    }

    /// Members of one staff role (`helper`, `moderator` or `admin`).
    pub async fn staff(&self, role: &str) -> Result<Vec<UserRecord>, ServiceError> {
        let role: Role = role
            .parse()
            .map_err(|e: dph_core::UnknownRole| ServiceError::BadRequest(e.to_string()))?;
        if role == Role::Default {
            return Err(ServiceError::BadRequest(format!(
                "{role} is not a staff role"
            )));
        }
        Ok(self.users.users_by_role(role).await?)
    }

    /// Turn a raw `Authorization` header value into a principal.
    ///
    /// Absent or empty headers resolve to `None` (anonymous).
    pub async fn resolve(&self, raw: Option<&str>) -> Result<Option<Principal>, ServiceError> {
        let Some(token) = parse_credential(raw)? else {
            return Ok(None);
        };
        match self.users.user_by_token(token.as_str()).await? {
            Some(user) => Ok(Some(user.principal())),
            None => Err(CredentialError::UnknownCredential.into()),
        }
    }
}
