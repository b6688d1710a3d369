use chrono::Utc;
use once_cell::sync::Lazy;
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    dtos::auth::{AuthResponse, LoginRequest, RegisterRequest, TokenResponse},
    models::{organization::slug_from_email, Organization, User},
    services::{
        error::ServiceError, jwt::SessionClaims, revocation::RevocationStore, Database, TokenKind,
        TokenService,
    },
    utils::{hash_password, verify_password, Password, PasswordDigest},
};

/// Digest verified when login hits an unknown email, so the miss costs the
/// same as a wrong password and the response can't be timed to enumerate
/// accounts.
static UNKNOWN_ACCOUNT_DIGEST: Lazy<PasswordDigest> = Lazy::new(|| {
    hash_password(&Password::new("placeholder-for-unknown-accounts".to_string()))
        .unwrap_or_else(|_| PasswordDigest::new(String::new()))
});

#[derive(Clone)]
pub struct AuthService {
    db: Database,
    tokens: TokenService,
    revocation: Arc<dyn RevocationStore>,
}

impl AuthService {
    pub fn new(db: Database, tokens: TokenService, revocation: Arc<dyn RevocationStore>) -> Self {
        Self {
            db,
            tokens,
            revocation,
        }
    }

    /// Register a new account, creating its organization when none is given.
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, ServiceError> {
        // Friendly pre-check; the unique index on email is the real guard
        // against concurrent registrations.
        if self.db.find_user_by_email(&req.email).await?.is_some() {
            return Err(ServiceError::EmailAlreadyRegistered);
        }

        let password_hash = hash_password_blocking(req.password).await?;

        let user = match req.org_id {
            Some(org_id) => {
                let org = self
                    .db
                    .find_organization_by_id(org_id)
                    .await?
                    .ok_or(ServiceError::OrganizationNotFound)?;

                let user = User::new(
                    org.org_id,
                    req.email,
                    password_hash.into_string(),
                    req.display_name,
                );
                self.db.create_account(None, &user).await?;
                user
            }
            None => {
                // Self-serve tenant creation: organization and first user
                // commit together.
                let org_name = format!("{}'s Organization", req.display_name);
                let slug = slug_from_email(&req.email);
                let hash = password_hash.into_string();

                let org = Organization::new(org_name.clone(), slug.clone());
                let user = User::new(
                    org.org_id,
                    req.email.clone(),
                    hash.clone(),
                    req.display_name.clone(),
                );

                match self.db.create_account(Some(&org), &user).await {
                    Ok(()) => user,
                    Err(ServiceError::SlugTaken) => {
                        // Another tenant owns the slug; retry once with a
                        // random suffix.
                        let org =
                            Organization::new(org_name, format!("{}-{}", slug, random_suffix()));
                        let user = User::new(org.org_id, req.email, hash, req.display_name);
                        self.db.create_account(Some(&org), &user).await?;
                        user
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        tracing::info!(user_id = %user.user_id, org_id = %user.org_id, "User registered");

        let tokens = self.issue_tokens(user.user_id)?;
        Ok(AuthResponse {
            user: user.sanitized(),
            tokens,
        })
    }

    /// Verify credentials and issue a fresh token pair.
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, ServiceError> {
        let user = self.db.find_user_by_email(&req.email).await?;

        // Always verify a digest: unknown email and wrong password must be
        // indistinguishable in both error and latency.
        let digest = match &user {
            Some(u) => PasswordDigest::new(u.password_hash.clone()),
            None => UNKNOWN_ACCOUNT_DIGEST.clone(),
        };
        let verified = verify_password_blocking(req.password, digest).await?;

        let Some(user) = user else {
            return Err(ServiceError::InvalidCredentials);
        };
        if !verified {
            return Err(ServiceError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(ServiceError::AccountInactive);
        }

        let user = self
            .db
            .update_last_login(user.user_id)
            .await?
            .ok_or(ServiceError::AccountNotFound)?;

        tracing::info!(user_id = %user.user_id, "User logged in");

        let tokens = self.issue_tokens(user.user_id)?;
        Ok(AuthResponse {
            user: user.sanitized(),
            tokens,
        })
    }

    /// Exchange a refresh token for a new pair, consuming it.
    ///
    /// The presented token's id is revoked with an atomic insert-if-absent
    /// before the new pair is issued, so concurrent replays of the same
    /// token let at most one caller through.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, ServiceError> {
        let claims = self.tokens.decode(refresh_token)?;
        if claims.token_type != TokenKind::Refresh {
            return Err(ServiceError::WrongTokenType);
        }

        let user = self
            .db
            .find_user_by_id(claims.sub)
            .await?
            .ok_or(ServiceError::InvalidToken)?;
        if !user.is_active {
            return Err(ServiceError::InvalidToken);
        }

        let remaining = claims.exp - Utc::now().timestamp();
        if !self.revocation.revoke(&claims.jti, remaining).await {
            tracing::warn!(user_id = %claims.sub, "Refresh token replay detected");
            return Err(ServiceError::TokenRevoked);
        }

        tracing::info!(user_id = %user.user_id, "Token refreshed");

        self.issue_tokens(user.user_id)
    }

    /// Revoke the presented access token, and the paired refresh token when
    /// the client supplies it. Idempotent.
    pub async fn logout(
        &self,
        claims: &SessionClaims,
        refresh_token: Option<String>,
    ) -> Result<(), ServiceError> {
        let remaining = claims.exp - Utc::now().timestamp();
        self.revocation.revoke(&claims.jti, remaining).await;

        if let Some(token) = refresh_token {
            // Best effort; a garbage refresh token doesn't fail the logout
            if let Ok(refresh_claims) = self.tokens.decode(&token) {
                if refresh_claims.token_type == TokenKind::Refresh
                    && refresh_claims.sub == claims.sub
                {
                    let remaining = refresh_claims.exp - Utc::now().timestamp();
                    self.revocation.revoke(&refresh_claims.jti, remaining).await;
                }
            }
        }

        tracing::info!(user_id = %claims.sub, "User logged out");
        Ok(())
    }

    /// Resolve a bearer token into an account. Hot path of every protected
    /// request: one revocation round trip, one primary-key lookup.
    pub async fn authenticate(&self, token: &str) -> Result<(User, SessionClaims), ServiceError> {
        let claims = self.tokens.decode(token)?;
        if claims.token_type != TokenKind::Access {
            return Err(ServiceError::WrongTokenType);
        }

        if self.revocation.is_revoked(&claims.jti).await {
            return Err(ServiceError::TokenRevoked);
        }

        let user = self
            .db
            .find_user_by_id(claims.sub)
            .await?
            .ok_or(ServiceError::AccountNotFound)?;
        if !user.is_active {
            return Err(ServiceError::AccountInactive);
        }

        Ok((user, claims))
    }

    /// Change the account password after re-verifying the current one.
    pub async fn change_password(
        &self,
        user: &User,
        current_password: String,
        new_password: String,
    ) -> Result<(), ServiceError> {
        let digest = PasswordDigest::new(user.password_hash.clone());
        if !verify_password_blocking(current_password, digest).await? {
            return Err(ServiceError::InvalidCredentials);
        }

        let new_hash = hash_password_blocking(new_password).await?;
        self.db
            .update_password(user.user_id, new_hash.as_str())
            .await?;

        tracing::info!(user_id = %user.user_id, "Password changed");
        Ok(())
    }

    fn issue_tokens(&self, user_id: Uuid) -> Result<TokenResponse, ServiceError> {
        let (access_token, refresh_token) = self.tokens.issue_pair(user_id)?;
        Ok(TokenResponse::new(
            access_token,
            refresh_token,
            self.tokens.access_token_expiry_seconds(),
        ))
    }
}

/// Argon2 is intentionally slow; keep it off the async worker threads.
async fn hash_password_blocking(password: String) -> Result<PasswordDigest, ServiceError> {
    tokio::task::spawn_blocking(move || hash_password(&Password::new(password)))
        .await
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Hashing task failed: {}", e)))?
        .map_err(ServiceError::Internal)
}

async fn verify_password_blocking(
    password: String,
    digest: PasswordDigest,
) -> Result<bool, ServiceError> {
    tokio::task::spawn_blocking(move || verify_password(&Password::new(password), &digest))
        .await
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Verification task failed: {}", e)))
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 4] = rng.gen();
    hex::encode(bytes)
}
