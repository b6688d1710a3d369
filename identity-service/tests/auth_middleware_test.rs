//! Bearer-token rejection paths of the auth middleware. All hermetic: every
//! case fails before the account lookup would touch the database.

mod common;

use axum::http::{Method, StatusCode};
use common::*;
use identity_service::{config::JwtConfig, services::TokenService};
use uuid::Uuid;

#[tokio::test]
async fn missing_authorization_header_is_401() {
    let (router, _state) = hermetic_router(create_test_config()).await;

    let response = send_request(&router, Method::GET, "/auth/me", None, None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Could not validate credentials");
}

#[tokio::test]
async fn garbage_token_is_401() {
    let (router, _state) = hermetic_router(create_test_config()).await;

    let response = send_request(
        &router,
        Method::GET,
        "/auth/me",
        None,
        Some("not-a-real-token"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_token_is_rejected_on_access_endpoints() {
    let (router, state) = hermetic_router(create_test_config()).await;

    let refresh_token = state
        .tokens
        .issue_refresh(Uuid::new_v4())
        .expect("issue failed");

    let response = send_request(
        &router,
        Method::GET,
        "/auth/me",
        None,
        Some(&refresh_token),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Could not validate credentials");
}

#[tokio::test]
async fn expired_token_is_401() {
    let (router, _state) = hermetic_router(create_test_config()).await;

    // Same secret, already-elapsed lifetime
    let expired_issuer = TokenService::new(&JwtConfig {
        secret_key: TEST_SECRET_KEY.to_string(),
        access_token_expiry_minutes: -1,
        refresh_token_expiry_days: 7,
    });
    let token = expired_issuer
        .issue_access(Uuid::new_v4())
        .expect("issue failed");

    let response = send_request(&router, Method::GET, "/auth/me", None, Some(&token)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_signed_with_foreign_key_is_401() {
    let (router, _state) = hermetic_router(create_test_config()).await;

    let foreign_issuer = TokenService::new(&JwtConfig {
        secret_key: "some-other-service-key-32-bytes-long!!".to_string(),
        access_token_expiry_minutes: 30,
        refresh_token_expiry_days: 7,
    });
    let token = foreign_issuer
        .issue_access(Uuid::new_v4())
        .expect("issue failed");

    let response = send_request(&router, Method::GET, "/auth/me", None, Some(&token)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn revoked_token_is_401_before_expiry() {
    let (router, state) = hermetic_router(create_test_config()).await;

    let token = state
        .tokens
        .issue_access(Uuid::new_v4())
        .expect("issue failed");
    let claims = state.tokens.decode(&token).expect("decode failed");

    // Revoke for the token's remaining lifetime
    assert!(state.revocation.revoke(&claims.jti, 1800).await);

    let response = send_request(&router, Method::GET, "/auth/me", None, Some(&token)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Could not validate credentials");
}
