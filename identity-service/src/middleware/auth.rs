use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use platform_core::error::AppError;

use crate::{models::User, services::SessionClaims, AppState};

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Middleware guarding every protected route.
///
/// Resolves the bearer token into an account (signature, expiry, type,
/// revocation, account state) and stores the account and claims in request
/// extensions. Handlers derive the tenant id from the stored account, never
/// from client input.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).ok_or_else(|| {
        AppError::AuthError(anyhow::anyhow!("Could not validate credentials"))
    })?;

    let (user, claims) = state.auth_service.authenticate(token).await?;

    req.extensions_mut().insert(user);
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// The account resolved by [`auth_middleware`], for use in handlers.
pub struct CurrentUser(pub User);

/// The access-token claims resolved by [`auth_middleware`]; logout needs
/// the jti and expiry.
pub struct AccessClaims(pub SessionClaims);

fn missing_extension(what: &str) -> AppError {
    AppError::InternalError(anyhow::anyhow!(
        "{} missing from request extensions; is the route behind auth_middleware?",
        what
    ))
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<User>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| missing_extension("authenticated user"))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AccessClaims
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionClaims>()
            .cloned()
            .map(AccessClaims)
            .ok_or_else(|| missing_extension("session claims"))
    }
}
