use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::services::error::ServiceError;

/// Session token codec.
///
/// Issues and verifies signed, self-contained session tokens. The algorithm
/// is pinned to HS256 on both sides; tokens presenting any other algorithm
/// are rejected. Revocation is deliberately not this type's concern.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
    refresh_token_expiry_days: i64,
}

/// Which operation a token is good for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claim set carried by every session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (account id)
    pub sub: Uuid,
    /// Access or refresh
    #[serde(rename = "type")]
    pub token_type: TokenKind,
    /// Unique id for revocation tracking (256 bits, hex)
    pub jti: String,
    /// Issuance time, Unix seconds
    pub iat: i64,
    /// Expiry, Unix seconds
    pub exp: i64,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret_key.as_bytes()),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        }
    }

    /// Issue an access token for an account.
    pub fn issue_access(&self, user_id: Uuid) -> Result<String, ServiceError> {
        self.issue(
            user_id,
            TokenKind::Access,
            Duration::minutes(self.access_token_expiry_minutes),
        )
    }

    /// Issue a refresh token for an account.
    pub fn issue_refresh(&self, user_id: Uuid) -> Result<String, ServiceError> {
        self.issue(
            user_id,
            TokenKind::Refresh,
            Duration::days(self.refresh_token_expiry_days),
        )
    }

    /// Issue an access/refresh pair.
    pub fn issue_pair(&self, user_id: Uuid) -> Result<(String, String), ServiceError> {
        Ok((self.issue_access(user_id)?, self.issue_refresh(user_id)?))
    }

    fn issue(
        &self,
        user_id: Uuid,
        token_type: TokenKind,
        ttl: Duration,
    ) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user_id,
            token_type,
            jti: generate_token_id(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        let header = Header::new(Algorithm::HS256);
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode token: {}", e)))
    }

    /// Verify signature and expiry, returning the claim set.
    ///
    /// Signature is checked before expiry; an expired token with a bad
    /// signature is reported as invalid, not expired.
    pub fn decode(&self, token: &str) -> Result<SessionClaims, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        match decode::<SessionClaims>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Err(ServiceError::TokenExpired)
                }
                _ => Err(ServiceError::InvalidToken),
            },
        }
    }

    /// Access-token lifetime in seconds, reported to clients as `expires_in`.
    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }
}

/// 32 random bytes, hex-encoded.
fn generate_token_id() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    hex::encode(token_bytes)
}
