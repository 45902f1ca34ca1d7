//! Tests for registration, login and logout.

mod common;

use axum::http::StatusCode;
use common::{
    PASSWORD, create_test_app, has_cleared_cookie, json_body, session_from, sets_no_cookies,
};
use moviegate::db::UserRole;
use serde_json::json;
use std::time::Instant;

#[tokio::test]
async fn test_register_creates_user() {
    let app = create_test_app().await;

    let response = app
        .request(
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({ "username": "alice", "password": PASSWORD })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(sets_no_cookies(&response), "registration does not log in");
    let body = json_body(response).await;
    assert_eq!(body["username"], "alice");
    assert_eq!(body["role"], "user");
    assert!(body.get("hashed_password").is_none());

    let user = app.db.users().find_by_username("alice").await.unwrap();
    assert!(user.is_some());
}

#[tokio::test]
async fn test_register_duplicate_username() {
    let app = create_test_app().await;
    app.create_user("alice", UserRole::User).await;

    let response = app
        .request(
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({ "username": "alice", "password": PASSWORD })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_validates_input() {
    let app = create_test_app().await;

    for (username, password) in [
        ("", PASSWORD),
        ("has space", PASSWORD),
        ("a_very_long_username_indeed", PASSWORD),
        ("alice", "abcd"),
    ] {
        let response = app
            .request(
                "POST",
                "/api/v1/auth/register",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "{:?}/{:?} should be rejected",
            username,
            password
        );
    }
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = create_test_app().await;
    app.create_user("alice", UserRole::User).await;

    let response = app
        .request(
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "wrong-password" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(sets_no_cookies(&response));
    assert_eq!(json_body(response).await["error"], "Authorization failed.");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_login_unknown_user() {
    let app = create_test_app().await;

    let response = app
        .request(
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "nobody", "password": PASSWORD })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Authorization failed.");
}

#[tokio::test]
async fn test_unknown_user_costs_a_password_check() {
    let app = create_test_app().await;
    app.create_user("alice", UserRole::User).await;
    let attempt = |username: &'static str| {
        app.request(
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": username, "password": "wrong-password" })),
        )
    };

    // Warm up the fallback digest.
    attempt("nobody").await;

    let start = Instant::now();
    let response = attempt("alice").await;
    let known = start.elapsed();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let start = Instant::now();
    let response = attempt("nobody").await;
    let unknown = start.elapsed();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Failing fast on an unknown name would reveal which names exist.
    assert!(
        unknown * 4 >= known,
        "unknown user failed in {:?}, wrong password in {:?}",
        unknown,
        known
    );
}

#[tokio::test]
async fn test_login_issues_session() {
    let app = create_test_app().await;
    app.create_user("alice", UserRole::User).await;

    let session = app.login("alice").await;

    assert!(!session.access.is_empty());
    assert!(!session.refresh.is_empty());
    assert_eq!(app.store.len(), 1);
}

#[tokio::test]
async fn test_relogin_replaces_previous_session() {
    let app = create_test_app().await;
    app.create_user("alice", UserRole::User).await;
    let first = app.login("alice").await;

    let response = app
        .request(
            "POST",
            "/api/v1/auth/login",
            Some(&first.cookie_header()),
            Some(json!({ "username": "alice", "password": PASSWORD })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let second = session_from(&response).unwrap();
    assert_ne!(second.refresh, first.refresh);
    assert_eq!(app.store.len(), 1, "previous refresh entry should be gone");
}

#[tokio::test]
async fn test_sessions_on_two_devices_are_independent() {
    let app = create_test_app().await;
    let (id, laptop) = app.user_session("alice").await;
    let phone = app.login("alice").await;
    assert_eq!(app.store.len(), 2);

    let response = app.get("/api/v1/auth/logout", &laptop).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get(&format!("/api/v1/users/{}", id), &phone).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.store.len(), 1);
}

#[tokio::test]
async fn test_logout_revokes_and_clears() {
    let app = create_test_app().await;
    let (_, session) = app.user_session("alice").await;

    let response = app.get("/api/v1/auth/logout", &session).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(has_cleared_cookie(&response, "access_token"));
    assert!(has_cleared_cookie(&response, "refresh_token"));
    assert_eq!(
        json_body(response).await["message"],
        "Logged out successfully."
    );
    assert!(app.store.is_empty());

    // The refresh credential cannot be replayed.
    let response = app
        .request(
            "GET",
            "/api/v1/users/me",
            Some(&session.refresh_only()),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_guest_logout_is_noop() {
    let app = create_test_app().await;

    let response = app.request("GET", "/api/v1/auth/logout", None, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(sets_no_cookies(&response));
}
