//! PostgreSQL data access for accounts and organizations.

use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::{Organization, User};
use crate::services::error::ServiceError;

/// Owns every SQL statement in the service. Handlers and the auth service
/// only ever see typed rows.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // -------- accounts --------

    pub async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Exact-match lookup; email comparison is case-sensitive by contract.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Insert a new account and, for self-serve registration, its
    /// organization, committing both together or neither.
    ///
    /// Unique-index violations are translated so callers see the same error
    /// whether a duplicate was caught by their pre-check or here at commit.
    pub async fn create_account(
        &self,
        new_org: Option<&Organization>,
        user: &User,
    ) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        if let Some(org) = new_org {
            sqlx::query(
                "INSERT INTO organizations (org_id, org_name, org_slug, created_utc, updated_utc) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(org.org_id)
            .bind(&org.org_name)
            .bind(&org.org_slug)
            .bind(org.created_utc)
            .bind(org.updated_utc)
            .execute(&mut *tx)
            .await
            .map_err(translate_unique_violation)?;
        }

        sqlx::query(
            "INSERT INTO users \
               (user_id, org_id, email, password_hash, display_name, timezone, \
                avatar_url, is_active, last_login_utc, created_utc, updated_utc) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(user.user_id)
        .bind(user.org_id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .bind(&user.timezone)
        .bind(&user.avatar_url)
        .bind(user.is_active)
        .bind(user.last_login_utc)
        .bind(user.created_utc)
        .bind(user.updated_utc)
        .execute(&mut *tx)
        .await
        .map_err(translate_unique_violation)?;

        tx.commit().await.map_err(translate_unique_violation)?;
        Ok(())
    }

    pub async fn update_last_login(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let row: Option<User> = sqlx::query_as(
            "UPDATE users SET last_login_utc = now(), updated_utc = now() \
             WHERE user_id = $1 RETURNING *",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Apply a sparse profile patch. Each field is written only when the
    /// caller supplied it; absent fields keep their stored value.
    pub async fn update_user_profile(
        &self,
        user_id: Uuid,
        display_name: Option<&str>,
        timezone: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<Option<User>, ServiceError> {
        let row: Option<User> = sqlx::query_as(
            "UPDATE users SET \
               display_name = COALESCE($2, display_name), \
               timezone     = COALESCE($3, timezone), \
               avatar_url   = COALESCE($4, avatar_url), \
               updated_utc  = now() \
             WHERE user_id = $1 RETURNING *",
        )
        .bind(user_id)
        .bind(display_name)
        .bind(timezone)
        .bind(avatar_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn update_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), ServiceError> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_utc = now() WHERE user_id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // -------- organizations --------

    pub async fn find_organization_by_id(
        &self,
        org_id: Uuid,
    ) -> Result<Option<Organization>, ServiceError> {
        let row: Option<Organization> =
            sqlx::query_as("SELECT * FROM organizations WHERE org_id = $1")
                .bind(org_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }
}

fn translate_unique_violation(e: sqlx::Error) -> ServiceError {
    let constraint = match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => db_err.constraint(),
        _ => None,
    };
    match constraint {
        Some("idx_users_email") => ServiceError::EmailAlreadyRegistered,
        Some("organizations_org_slug_key") => ServiceError::SlugTaken,
        _ => ServiceError::Database(e),
    }
}
