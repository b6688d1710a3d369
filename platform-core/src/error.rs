use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Whether error responses include internal detail. Off by default; services
/// enable it at startup when running outside production.
static EXPOSE_ERROR_DETAILS: AtomicBool = AtomicBool::new(false);

pub fn set_expose_error_details(expose: bool) {
    EXPOSE_ERROR_DETAILS.store(expose, Ordering::Relaxed);
}

pub fn error_details_exposed() -> bool {
    EXPOSE_ERROR_DETAILS.load(Ordering::Relaxed)
}

/// Boundary error type shared by every service in the workspace.
///
/// Domain errors are converted into this at the handler layer; the
/// `IntoResponse` impl is the single place an error becomes JSON.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("not found: {0}")]
    NotFound(anyhow::Error),

    #[error("authentication failed: {0}")]
    AuthError(anyhow::Error),

    #[error("forbidden: {0}")]
    Forbidden(anyhow::Error),

    #[error("conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("rate limited: {0}")]
    TooManyRequests(String, Option<u64>),

    #[error("internal error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("service unavailable")]
    ServiceUnavailable,

    #[error("database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AuthError(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::TooManyRequests(..) => StatusCode::TOO_MANY_REQUESTS,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InternalError(_) | Self::DatabaseError(_) | Self::ConfigError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// What the caller is told. Client-fault errors carry their reason;
    /// server-fault errors collapse onto a fixed message.
    fn public_message(&self) -> String {
        match self {
            Self::ValidationError(_) => "Validation error".to_string(),
            Self::BadRequest(e)
            | Self::NotFound(e)
            | Self::AuthError(e)
            | Self::Forbidden(e)
            | Self::Conflict(e) => e.to_string(),
            Self::TooManyRequests(msg, _) => msg.clone(),
            Self::InternalError(_) => "Internal server error".to_string(),
            Self::ServiceUnavailable => "Service unavailable".to_string(),
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::ConfigError(_) => "Configuration error".to_string(),
        }
    }

    /// Extra detail for the body. Validation detail is always safe to
    /// return; internal causes only leave the process when the service
    /// opted in at startup.
    fn detail(&self) -> Option<String> {
        match self {
            Self::ValidationError(e) => Some(e.to_string()),
            Self::InternalError(e) if error_details_exposed() => Some(format!("{:#}", e)),
            Self::DatabaseError(e) | Self::ConfigError(e) if error_details_exposed() => {
                Some(e.to_string())
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.public_message(),
            details: self.detail(),
        };

        let mut response = (self.status(), Json(body)).into_response();

        if let AppError::TooManyRequests(_, Some(retry_after)) = self {
            response
                .headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry_after.into());
        }

        response
    }
}
