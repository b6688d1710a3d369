use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::UserResponse;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Not a valid email address"))]
    #[schema(example = "alice@acme.test")]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "correct-horse-42", min_length = 8)]
    pub password: String,

    #[validate(length(min = 1, max = 200, message = "Display name is required"))]
    #[schema(example = "Alice Doe")]
    pub display_name: String,

    /// Join an existing organization; omitted for self-serve tenant creation.
    #[schema(example = "0192b5e3-8c4a-7d60-b3a1-5f2e9d8c7b6a")]
    pub org_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Not a valid email address"))]
    #[schema(example = "alice@acme.test")]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "correct-horse-42")]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    #[schema(example = "refresh-token-123")]
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LogoutRequest {
    /// When supplied, the paired refresh token is revoked along with the
    /// access token.
    #[schema(example = "refresh-token-123")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 200, message = "Display name must not be empty"))]
    #[schema(example = "Alice D.")]
    pub display_name: Option<String>,

    #[validate(length(min = 1, max = 50, message = "Timezone must not be empty"))]
    #[schema(example = "Europe/Berlin")]
    pub timezone: Option<String>,

    #[validate(length(max = 500, message = "Avatar URL too long"))]
    #[schema(example = "https://cdn.example.com/avatars/alice.png")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(min = 8, message = "New password must be at least 8 characters"))]
    #[schema(min_length = 8)]
    pub new_password: String,
}

/// Token pair returned by register/login/refresh.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Access token lifetime in seconds
    #[schema(example = 1800)]
    pub expires_in: i64,
}

impl TokenResponse {
    pub fn new(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

/// Account profile plus its fresh token pair.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: TokenResponse,
}
