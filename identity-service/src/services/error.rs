use platform_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("Organization not found")]
    OrganizationNotFound,

    #[error("Organization slug already in use")]
    SlugTaken,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Wrong token type")]
    WrongTokenType,
}

/// Map domain errors onto the HTTP boundary.
///
/// Credential and token failures collapse onto two stable messages so the
/// response never reveals which check rejected the request; the specific
/// variant is still logged for triage.
impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::InvalidCredentials => {
                AppError::AuthError(anyhow::anyhow!("Incorrect email or password"))
            }
            ServiceError::AccountInactive => {
                AppError::Forbidden(anyhow::anyhow!("Account is inactive"))
            }
            ServiceError::EmailAlreadyRegistered => {
                AppError::BadRequest(anyhow::anyhow!("Email already registered"))
            }
            ServiceError::OrganizationNotFound => {
                AppError::BadRequest(anyhow::anyhow!("Organization not found"))
            }
            ServiceError::SlugTaken => {
                AppError::Conflict(anyhow::anyhow!("Organization slug already in use"))
            }
            ServiceError::AccountNotFound
            | ServiceError::InvalidToken
            | ServiceError::TokenExpired
            | ServiceError::TokenRevoked
            | ServiceError::WrongTokenType => {
                tracing::debug!(reason = %err, "Rejecting credentials");
                AppError::AuthError(anyhow::anyhow!("Could not validate credentials"))
            }
        }
    }
}
