//! Tests for user profile endpoints and their effect on sessions.

mod common;

use axum::http::{StatusCode, header};
use common::{PASSWORD, create_test_app, has_cleared_cookie, json_body, session_from};
use moviegate::db::UserRole;
use serde_json::json;

#[tokio::test]
async fn test_me_redirect_keeps_method() {
    let app = create_test_app().await;
    let (id, session) = app.user_session("alice").await;

    for method in ["GET", "PUT", "DELETE"] {
        let response = app
            .request(method, "/api/v1/users/me", Some(&session.cookie_header()), None)
            .await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            format!("/api/v1/users/{}", id).as_str()
        );
    }
}

#[tokio::test]
async fn test_users_cannot_read_each_other() {
    let app = create_test_app().await;
    let (_, alice) = app.user_session("alice").await;
    let (bob_id, _) = app.user_session("bob").await;

    let response = app.get(&format!("/api/v1/users/{}", bob_id), &alice).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        json_body(response).await["error"],
        "You do not own this resource"
    );
}

#[tokio::test]
async fn test_admin_reads_any_user() {
    let app = create_test_app().await;
    let (bob_id, _) = app.user_session("bob").await;
    let (_, admin) = app.admin_session("root").await;

    let response = app.get(&format!("/api/v1/users/{}", bob_id), &admin).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["username"], "bob");

    let response = app.get("/api/v1/users/999", &admin).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "User not found");
}

#[tokio::test]
async fn test_update_own_password_rotates_session() {
    let app = create_test_app().await;
    let (id, session) = app.user_session("alice").await;

    let response = app
        .request(
            "PUT",
            &format!("/api/v1/users/{}", id),
            Some(&session.cookie_header()),
            Some(json!({ "password": "new-password" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let rotated = session_from(&response).expect("identity update should rotate the pair");
    assert_ne!(rotated.refresh, session.refresh);
    assert_eq!(
        json_body(response).await["message"],
        "User has been updated successfully."
    );
    assert_eq!(app.store.len(), 1);

    let response = app
        .request(
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "new-password" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_user_cannot_change_role() {
    let app = create_test_app().await;
    let (id, session) = app.user_session("alice").await;

    let response = app
        .request(
            "PUT",
            &format!("/api/v1/users/{}", id),
            Some(&session.cookie_header()),
            Some(json!({ "password": PASSWORD, "role": "admin" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let user = app.db.users().find_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.role, UserRole::User);
}

#[tokio::test]
async fn test_admin_role_change_revokes_target_sessions() {
    let app = create_test_app().await;
    let (bob_id, bob) = app.user_session("bob").await;
    let (_, admin) = app.admin_session("root").await;

    let response = app
        .request(
            "PUT",
            &format!("/api/v1/users/{}", bob_id),
            Some(&admin.cookie_header()),
            Some(json!({ "password": PASSWORD, "role": "admin" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["user"]["role"], "admin");

    // Bob's stored refresh entry carried the old role; it is gone.
    let response = app
        .request(
            "GET",
            "/api/v1/users/me",
            Some(&bob.refresh_only()),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A fresh login picks up the new role.
    let bob = app.login("bob").await;
    let response = app.get("/api/v1/admin/users", &bob).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_guest_role_cannot_be_assigned() {
    let app = create_test_app().await;
    let (bob_id, _) = app.user_session("bob").await;
    let (_, admin) = app.admin_session("root").await;

    let response = app
        .request(
            "PUT",
            &format!("/api/v1/users/{}", bob_id),
            Some(&admin.cookie_header()),
            Some(json!({ "password": PASSWORD, "role": "guest" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_guest_cannot_update() {
    let app = create_test_app().await;

    let response = app
        .request(
            "PUT",
            "/api/v1/users/0",
            None,
            Some(json!({ "password": PASSWORD })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delete_self_logs_out() {
    let app = create_test_app().await;
    let (id, session) = app.user_session("alice").await;

    let response = app
        .request(
            "DELETE",
            &format!("/api/v1/users/{}", id),
            Some(&session.cookie_header()),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(has_cleared_cookie(&response, "refresh_token"));
    assert!(app.store.is_empty());
    assert!(app.db.users().find_by_id(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_self_ends_other_sessions() {
    let app = create_test_app().await;
    let (id, laptop) = app.user_session("alice").await;
    let phone = app.login("alice").await;
    assert_eq!(app.store.len(), 2);

    let response = app
        .request(
            "DELETE",
            &format!("/api/v1/users/{}", id),
            Some(&laptop.cookie_header()),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.store.is_empty());

    // The phone cannot rotate its way back in.
    let response = app
        .request(
            "GET",
            "/api/v1/users/me",
            Some(&phone.refresh_only()),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(has_cleared_cookie(&response, "refresh_token"));
}

#[tokio::test]
async fn test_admin_delete_revokes_all_target_sessions() {
    let app = create_test_app().await;
    let (bob_id, bob_laptop) = app.user_session("bob").await;
    let bob_phone = app.login("bob").await;
    let (_, admin) = app.admin_session("root").await;

    let response = app
        .request(
            "DELETE",
            &format!("/api/v1/users/{}", bob_id),
            Some(&admin.cookie_header()),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers().get(header::SET_COOKIE).is_none(),
        "admin keeps their own session"
    );
    assert_eq!(app.store.len(), 1);

    for session in [bob_laptop, bob_phone] {
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
}

#[tokio::test]
async fn test_list_users_admin_only() {
    let app = create_test_app().await;
    let (_, alice) = app.user_session("alice").await;
    app.create_user("bob", UserRole::User).await;
    let (_, admin) = app.admin_session("root").await;

    let response = app.get("/api/v1/users/all", &alice).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.get("/api/v1/users/all", &admin).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 3);

    let response = app
        .get("/api/v1/users/all?role=admin&sort-by=username", &admin)
        .await;
    let body = json_body(response).await;
    let names: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["root"]);

    let response = app
        .get("/api/v1/users/all?username-contains=o&limit=1&offset=1", &admin)
        .await;
    let body = json_body(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["username"], "root");

    let response = app.get("/api/v1/users/all?limit=0", &admin).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
