pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Json, Router,
};
use platform_core::error::AppError;
use platform_core::middleware::{
    catch_panic::handle_panic,
    rate_limit::{rate_limit_middleware, SlidingWindowLimiter},
    security_headers::{security_headers_middleware, SecurityHeadersPolicy},
    tracing::{request_id_middleware, RequestId},
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use utoipa::{openapi::security::SecurityScheme, Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{Environment, IdentityConfig, SecurityConfig, SwaggerMode};
use crate::services::{AuthService, Database, RevocationStore, TokenService};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::registration::register,
        handlers::auth::session::login,
        handlers::auth::session::refresh,
        handlers::auth::session::logout,
        handlers::auth::session::me,
        handlers::user::update_me,
        handlers::user::change_password,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::auth::RegisterRequest,
            dtos::auth::LoginRequest,
            dtos::auth::RefreshRequest,
            dtos::auth::LogoutRequest,
            dtos::auth::UpdateProfileRequest,
            dtos::auth::ChangePasswordRequest,
            dtos::auth::TokenResponse,
            dtos::auth::AuthResponse,
            models::UserResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Account registration and session tokens"),
        (name = "User", description = "Profile management"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: IdentityConfig,
    pub db: Database,
    pub tokens: TokenService,
    pub auth_service: AuthService,
    pub revocation: Arc<dyn RevocationStore>,
    pub rate_limiter: SlidingWindowLimiter,
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = security
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %origin, error = %e, "Skipping invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let mut app = Router::new().route("/health", get(health_check));

    // Swagger UI: always in dev, per config in prod
    let swagger_enabled = state.config.environment == Environment::Dev
        || state.config.swagger.enabled == SwaggerMode::Public;

    if swagger_enabled {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    // Everything behind a valid access token
    let protected = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))
        .route("/users/me", patch(handlers::user::update_me))
        .route("/users/me/password", post(handlers::user::change_password))
        .layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    let headers_policy = SecurityHeadersPolicy {
        hsts: state.config.is_prod(),
    };
    let cors = cors_layer(&state.config.security);

    // Layer order, outermost first: CORS, security headers, correlation id
    // (assigned before the trace span reads it), request span, rate limit,
    // panic isolation, routes.
    let app = app
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .merge(protected)
        .with_state(state.clone())
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn_with_state(headers_policy, security_headers_middleware))
        .layer(cors);

    Ok(app)
}

/// Root span for one request; the correlation id middleware has already run
/// and left its id in the extensions.
fn request_span(request: &axum::http::Request<axum::body::Body>) -> tracing::Span {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.as_str())
        .unwrap_or("-");

    tracing::info_span!(
        "http_request",
        %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    )
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Service is unhealthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.db.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Database health check failed");
        AppError::ServiceUnavailable
    })?;

    // A degraded revocation cache is reported, not fatal: the service keeps
    // running on the process-local store.
    let cache_status = match state.revocation.health_check().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "Revocation cache health check failed");
            "degraded"
        }
    };

    Ok(Json(json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "database": "up",
            "revocation_cache": cache_status
        }
    })))
}
