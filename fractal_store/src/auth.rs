use fractal_types::{Permission, User, UserId};
use snafu::ResultExt;
use sqlx::types::Json;

use crate::error::{BcryptSnafu, Result, SqlxSnafu};
use crate::store::Store;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: uuid::Uuid,
    username: String,
    password_digest: String,
    permissions: Json<Vec<Permission>>,
    created_on: chrono::DateTime<chrono::Utc>,
    modified_on: chrono::DateTime<chrono::Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id.into(),
            username: r.username,
            password_digest: r.password_digest,
            permissions: r.permissions.0,
            created_on: r.created_on,
            modified_on: r.modified_on,
        }
    }
}

/// Credential storage and permission checks. `bypass_security` is a
/// development-mode escape hatch: when set, `verify` always succeeds
/// without touching the store.
pub struct AuthRepo<'a> {
    store: &'a Store,
    bypass_security: bool,
}

impl<'a> AuthRepo<'a> {
    pub fn new(store: &'a Store, bypass_security: bool) -> Self {
        Self {
            store,
            bypass_security,
        }
    }

    /// Stores a salted bcrypt digest of `password`. Returns `false` on a
    /// duplicate username rather than erroring.
    pub async fn add_user(
        &self,
        username: &str,
        password: &str,
        permissions: Vec<Permission>,
    ) -> Result<bool> {
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM users WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.store.pool)
                .await
                .context(SqlxSnafu)?;
        if existing.is_some() {
            return Ok(false);
        }

        let digest = bcrypt::hash(password, bcrypt::DEFAULT_COST).context(BcryptSnafu)?;
        let id = UserId::new();
        sqlx::query(
            "INSERT INTO users (id, username, password_digest, permissions) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id.get())
        .bind(username)
        .bind(&digest)
        .bind(Json(&permissions))
        .execute(&self.store.pool)
        .await
        .context(SqlxSnafu)?;

        Ok(true)
    }

    /// Checks `password` against the stored digest and `required` against
    /// the stored permission set (`admin` implies all). With
    /// `bypass_security` set, always returns `(true, "bypassed")`.
    pub async fn verify(
        &self,
        username: &str,
        password: &str,
        required: Permission,
    ) -> Result<(bool, String)> {
        if self.bypass_security {
            return Ok((true, "bypassed".to_string()));
        }

        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, password_digest, permissions, created_on, modified_on \
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.store.pool)
        .await
        .context(SqlxSnafu)?;

        let Some(row) = row else {
            return Ok((false, "no such user".to_string()));
        };

        let ok = bcrypt::verify(password, &row.password_digest).context(BcryptSnafu)?;
        if !ok {
            return Ok((false, "incorrect password".to_string()));
        }

        let user = User::from(row);
        if !user.has_permission(required) {
            return Ok((false, "insufficient permission".to_string()));
        }

        Ok((true, "Success".to_string()))
    }

    pub async fn remove_user(&self, username: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE username = $1")
            .bind(username)
            .execute(&self.store.pool)
            .await
            .context(SqlxSnafu)?;
        Ok(result.rows_affected() > 0)
    }
}
