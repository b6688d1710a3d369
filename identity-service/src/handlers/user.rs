use axum::{extract::State, response::IntoResponse, Json};
use platform_core::error::AppError;

use crate::{
    dtos::auth::{ChangePasswordRequest, UpdateProfileRequest},
    middleware::CurrentUser,
    services::ServiceError,
    utils::ValidatedJson,
    AppState,
};

/// Update the authenticated account's profile
///
/// Absent fields are left untouched.
#[utoipa::path(
    patch,
    path = "/users/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let updated = state
        .db
        .update_user_profile(
            user.user_id,
            req.display_name.as_deref(),
            req.timezone.as_deref(),
            req.avatar_url.as_deref(),
        )
        .await?
        .ok_or(ServiceError::AccountNotFound)?;

    Ok(Json(updated.sanitized()))
}

/// Change the authenticated account's password
#[utoipa::path(
    post,
    path = "/users/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 401, description = "Incorrect current password", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth_service
        .change_password(&user, req.current_password, req.new_password)
        .await?;

    Ok(Json(serde_json::json!({
        "message": "Password changed successfully"
    })))
}
