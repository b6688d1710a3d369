//! User model - tenant-scoped accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// User account entity. Owned by exactly one organization.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub org_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub timezone: String,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub last_login_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl User {
    /// Create a new active account.
    pub fn new(org_id: Uuid, email: String, password_hash: String, display_name: String) -> Self {
        let now = Utc::now();
        Self {
            user_id: Uuid::new_v4(),
            org_id,
            email,
            password_hash,
            display_name,
            timezone: "UTC".to_string(),
            avatar_url: None,
            is_active: true,
            last_login_utc: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// The shape this account takes in API responses; drops the credential
    /// digest.
    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self.clone())
    }
}

/// Public view of an account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub org_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub timezone: String,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub last_login_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            org_id: u.org_id,
            email: u.email,
            display_name: u.display_name,
            timezone: u.timezone,
            avatar_url: u.avatar_url,
            is_active: u.is_active,
            last_login_utc: u.last_login_utc,
            created_utc: u.created_utc,
        }
    }
}
