//! End-to-end authentication flows against live PostgreSQL.
//!
//! Run with `cargo test -- --ignored` and TEST_DATABASE_URL pointing at a
//! scratch database.

mod common;

use axum::http::{Method, StatusCode};
use common::*;
use serde_json::json;

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn full_session_lifecycle() {
    let (router, _state) = db_router(create_test_config()).await;
    let email = unique_email("alice");

    // Register
    let response = send_request(
        &router,
        Method::POST,
        "/auth/register",
        Some(json!({
            "email": email,
            "password": "Secretpw1",
            "display_name": "Alice"
        })),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["user"]["email"], email.as_str());
    assert_eq!(body["tokens"]["token_type"], "Bearer");
    let access_token = body["tokens"]["access_token"]
        .as_str()
        .expect("missing access token")
        .to_string();

    // Who am I
    let response = send_request(&router, Method::GET, "/auth/me", None, Some(&access_token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["email"], email.as_str());

    // Wrong password
    let response = send_request(
        &router,
        Method::POST,
        "/auth/login",
        Some(json!({ "email": email, "password": "wrongpw99" })),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Incorrect email or password");

    // Unknown email gets the identical error
    let response = send_request(
        &router,
        Method::POST,
        "/auth/login",
        Some(json!({ "email": unique_email("nobody"), "password": "wrongpw99" })),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Incorrect email or password");

    // Correct login
    let response = send_request(
        &router,
        Method::POST,
        "/auth/login",
        Some(json!({ "email": email, "password": "Secretpw1" })),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["user"]["last_login_utc"].is_string());

    // Logout revokes the access token
    let response = send_request(
        &router,
        Method::POST,
        "/auth/logout",
        None,
        Some(&access_token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The revoked token no longer authenticates, well before its expiry
    let response = send_request(&router, Method::GET, "/auth/me", None, Some(&access_token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A second logout with the same token is a defined rejection, not a crash
    let response = send_request(
        &router,
        Method::POST,
        "/auth/logout",
        None,
        Some(&access_token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn refresh_rotation_is_single_use() {
    let (router, _state) = db_router(create_test_config()).await;
    let email = unique_email("bob");

    let response = send_request(
        &router,
        Method::POST,
        "/auth/register",
        Some(json!({
            "email": email,
            "password": "Secretpw1",
            "display_name": "Bob"
        })),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let refresh_a = body["tokens"]["refresh_token"]
        .as_str()
        .expect("missing refresh token")
        .to_string();

    // First use succeeds and returns a new pair
    let response = send_request(
        &router,
        Method::POST,
        "/auth/refresh",
        Some(json!({ "refresh_token": refresh_a })),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let refresh_b = body["refresh_token"]
        .as_str()
        .expect("missing refresh token")
        .to_string();
    let access_b = body["access_token"].as_str().expect("missing access token");
    assert_ne!(refresh_a, refresh_b);

    // The new access token works
    let response = send_request(&router, Method::GET, "/auth/me", None, Some(access_b)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Replaying the consumed token fails
    let response = send_request(
        &router,
        Method::POST,
        "/auth/refresh",
        Some(json!({ "refresh_token": refresh_a })),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The rotated token is still good
    let response = send_request(
        &router,
        Method::POST,
        "/auth/refresh",
        Some(json!({ "refresh_token": refresh_b })),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn access_token_is_rejected_on_refresh_endpoint() {
    let (router, _state) = db_router(create_test_config()).await;
    let email = unique_email("carol");

    let response = send_request(
        &router,
        Method::POST,
        "/auth/register",
        Some(json!({
            "email": email,
            "password": "Secretpw1",
            "display_name": "Carol"
        })),
        None,
    )
    .await;
    let body = body_json(response).await;
    let access_token = body["tokens"]["access_token"]
        .as_str()
        .expect("missing access token")
        .to_string();

    let response = send_request(
        &router,
        Method::POST,
        "/auth/refresh",
        Some(json!({ "refresh_token": access_token })),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn duplicate_email_is_rejected() {
    let (router, _state) = db_router(create_test_config()).await;
    let email = unique_email("dave");

    let register_body = json!({
        "email": email,
        "password": "Secretpw1",
        "display_name": "Dave"
    });

    let response = send_request(
        &router,
        Method::POST,
        "/auth/register",
        Some(register_body.clone()),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send_request(
        &router,
        Method::POST,
        "/auth/register",
        Some(register_body),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Email already registered");
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn inactive_account_cannot_authenticate() {
    let (router, state) = db_router(create_test_config()).await;
    let email = unique_email("erin");

    let response = send_request(
        &router,
        Method::POST,
        "/auth/register",
        Some(json!({
            "email": email,
            "password": "Secretpw1",
            "display_name": "Erin"
        })),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let access_token = body["tokens"]["access_token"]
        .as_str()
        .expect("missing access token")
        .to_string();

    sqlx::query("UPDATE users SET is_active = FALSE WHERE email = $1")
        .bind(&email)
        .execute(state.db.pool())
        .await
        .expect("Failed to deactivate user");

    // Login is forbidden, not unauthorized: the password was right
    let response = send_request(
        &router,
        Method::POST,
        "/auth/login",
        Some(json!({ "email": email, "password": "Secretpw1" })),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Outstanding access tokens stop working too
    let response = send_request(&router, Method::GET, "/auth/me", None, Some(&access_token)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn self_serve_registration_creates_organization() {
    let (router, state) = db_router(create_test_config()).await;
    let email = unique_email("frank");

    let response = send_request(
        &router,
        Method::POST,
        "/auth/register",
        Some(json!({
            "email": email,
            "password": "Secretpw1",
            "display_name": "Frank"
        })),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let org_id = body["user"]["org_id"].as_str().expect("missing org id");
    let org_uuid = uuid::Uuid::parse_str(org_id).expect("org id is not a uuid");

    let org_name: String =
        sqlx::query_scalar("SELECT org_name FROM organizations WHERE org_id = $1")
            .bind(org_uuid)
            .fetch_one(state.db.pool())
            .await
            .expect("organization row missing");
    assert_eq!(org_name, "Frank's Organization");

    // A teammate joins the same organization explicitly
    let response = send_request(
        &router,
        Method::POST,
        "/auth/register",
        Some(json!({
            "email": unique_email("frank-colleague"),
            "password": "Secretpw1",
            "display_name": "Frank's Colleague",
            "org_id": org_id
        })),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["user"]["org_id"], org_id);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn profile_patch_only_touches_supplied_fields() {
    let (router, _state) = db_router(create_test_config()).await;
    let email = unique_email("grace");

    let response = send_request(
        &router,
        Method::POST,
        "/auth/register",
        Some(json!({
            "email": email,
            "password": "Secretpw1",
            "display_name": "Grace"
        })),
        None,
    )
    .await;
    let body = body_json(response).await;
    let access_token = body["tokens"]["access_token"]
        .as_str()
        .expect("missing access token")
        .to_string();

    let response = send_request(
        &router,
        Method::PATCH,
        "/users/me",
        Some(json!({ "display_name": "Grace H." })),
        Some(&access_token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["display_name"], "Grace H.");
    // Untouched fields keep their values
    assert_eq!(body["timezone"], "UTC");
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn change_password_requires_current_password() {
    let (router, _state) = db_router(create_test_config()).await;
    let email = unique_email("heidi");

    let response = send_request(
        &router,
        Method::POST,
        "/auth/register",
        Some(json!({
            "email": email,
            "password": "Secretpw1",
            "display_name": "Heidi"
        })),
        None,
    )
    .await;
    let body = body_json(response).await;
    let access_token = body["tokens"]["access_token"]
        .as_str()
        .expect("missing access token")
        .to_string();

    let response = send_request(
        &router,
        Method::POST,
        "/users/me/password",
        Some(json!({
            "current_password": "wrong-password",
            "new_password": "NewSecret99"
        })),
        Some(&access_token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send_request(
        &router,
        Method::POST,
        "/users/me/password",
        Some(json!({
            "current_password": "Secretpw1",
            "new_password": "NewSecret99"
        })),
        Some(&access_token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Old password no longer works; new one does
    let response = send_request(
        &router,
        Method::POST,
        "/auth/login",
        Some(json!({ "email": email, "password": "Secretpw1" })),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send_request(
        &router,
        Method::POST,
        "/auth/login",
        Some(json!({ "email": email, "password": "NewSecret99" })),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}
