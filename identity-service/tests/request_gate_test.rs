//! Cross-cutting middleware behavior: correlation ids, security headers,
//! rate limiting. All hermetic - requests are rejected before any database
//! access.

mod common;

use axum::http::{Method, StatusCode};
use common::*;
use serde_json::json;

fn garbage_refresh_body() -> serde_json::Value {
    json!({ "refresh_token": "not-a-real-token" })
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let (router, _state) = hermetic_router(create_test_config()).await;

    let response = send_request(
        &router,
        Method::POST,
        "/auth/refresh",
        Some(garbage_refresh_body()),
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("missing x-request-id header");
    assert!(!request_id.to_str().unwrap().is_empty());
}

#[tokio::test]
async fn supplied_request_id_is_propagated() {
    let (router, _state) = hermetic_router(create_test_config()).await;

    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/auth/refresh")
        .header("content-type", "application/json")
        .header("x-request-id", "caller-supplied-id-42")
        .body(axum::body::Body::from(garbage_refresh_body().to_string()))
        .unwrap();

    let response = tower::util::ServiceExt::oneshot(router.clone(), request)
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "caller-supplied-id-42"
    );
}

#[tokio::test]
async fn security_headers_are_set() {
    let (router, _state) = hermetic_router(create_test_config()).await;

    let response = send_request(
        &router,
        Method::POST,
        "/auth/refresh",
        Some(garbage_refresh_body()),
        None,
    )
    .await;

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(
        headers.get("content-security-policy").unwrap(),
        "default-src 'none'; frame-ancestors 'none'"
    );
    // Dev config: no HSTS without TLS
    assert!(headers.get("strict-transport-security").is_none());
}

#[tokio::test]
async fn budget_exhaustion_returns_429_with_hints() {
    let mut config = create_test_config();
    config.rate_limit.requests_per_minute = 3;
    let (router, _state) = hermetic_router(config).await;

    for _ in 0..3 {
        let response = send_request(
            &router,
            Method::POST,
            "/auth/refresh",
            Some(garbage_refresh_body()),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get("x-ratelimit-remaining").is_some());
    }

    let response = send_request(
        &router,
        Method::POST,
        "/auth/refresh",
        Some(garbage_refresh_body()),
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let headers = response.headers();
    assert!(headers.get("retry-after").is_some());
    assert_eq!(headers.get("x-ratelimit-limit").unwrap(), "3");
    assert_eq!(headers.get("x-ratelimit-remaining").unwrap(), "0");
    // Correlation id survives the rejection
    assert!(headers.get("x-request-id").is_some());
}

#[tokio::test]
async fn health_path_is_exempt_from_rate_limiting() {
    let mut config = create_test_config();
    config.rate_limit.requests_per_minute = 1;
    let (router, _state) = hermetic_router(config).await;

    // The lazy pool makes /health report unavailable; the point is that it
    // is never 429 even far past the budget.
    for _ in 0..5 {
        let response = send_request(&router, Method::GET, "/health", None, None).await;
        assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}

#[tokio::test]
async fn invalid_payload_is_rejected_before_any_work() {
    let (router, _state) = hermetic_router(create_test_config()).await;

    // Bad email shape
    let response = send_request(
        &router,
        Method::POST,
        "/auth/register",
        Some(json!({
            "email": "not-an-email",
            "password": "Secretpw1",
            "display_name": "Alice"
        })),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Short password
    let response = send_request(
        &router,
        Method::POST,
        "/auth/register",
        Some(json!({
            "email": "alice@example.com",
            "password": "short",
            "display_name": "Alice"
        })),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Malformed JSON
    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/auth/register")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let response = tower::util::ServiceExt::oneshot(router.clone(), request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
