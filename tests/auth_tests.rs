mod common;

use axum::http::StatusCode;
use common::*;
use frontdesk::db::{CreateUserInput, UserKind};
use serde_json::json;

#[tokio::test]
async fn test_login_sets_cookie_and_me_returns_user() {
    let t = setup().await;
    let admin_id = create_admin(&t.db, "admin@test", "hunter2hunter2").await;

    let cookie = t.login("admin@test", "hunter2hunter2").await;

    let response = t.get("/api/auth/me", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], admin_id);
    assert_eq!(body["login"], "admin@test");
    assert_eq!(body["admin"], true);
    assert_eq!(body["kind"], "internal");
    assert_eq!(body["impersonating"], false);
}

#[tokio::test]
async fn test_wrong_password_and_unknown_login_are_indistinguishable() {
    let t = setup().await;
    create_admin(&t.db, "admin@test", "hunter2hunter2").await;

    let wrong = t
        .post_json(
            "/api/auth/login",
            None,
            json!({ "login": "admin@test", "password": "nope" }),
        )
        .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let wrong_body = body_json(wrong).await;

    let unknown = t
        .post_json(
            "/api/auth/login",
            None,
            json!({ "login": "ghost@test", "password": "nope" }),
        )
        .await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    let unknown_body = body_json(unknown).await;

    assert_eq!(wrong_body["error"], unknown_body["error"]);
}

#[tokio::test]
async fn test_unclaimed_account_cannot_login() {
    let t = setup().await;
    // A portal user without a password hash (invite not yet claimed).
    t.db.users()
        .create(CreateUserInput {
            login: "new@test",
            kind: UserKind::Portal,
            partner_id: None,
        })
        .await
        .unwrap();

    let response = t
        .post_json(
            "/api/auth/login",
            None,
            json!({ "login": "new@test", "password": "anything" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_deletes_session() {
    let t = setup().await;
    create_admin(&t.db, "admin@test", "hunter2hunter2").await;
    let cookie = t.login("admin@test", "hunter2hunter2").await;

    let response = t.post_empty("/api/auth/logout", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = t.get("/api/auth/me", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_without_cookie_is_unauthorized() {
    let t = setup().await;
    let response = t.get("/api/auth/me", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_mfa_login_leaves_session_pending() {
    let t = setup().await;
    let id = create_admin(&t.db, "admin@test", "hunter2hunter2").await;
    t.db.users().set_mfa_enabled(id, true).await.unwrap();

    let response = t
        .post_json(
            "/api/auth/login",
            None,
            json!({ "login": "admin@test", "password": "hunter2hunter2" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response);
    let body = body_json(response).await;
    assert_eq!(body["pending"], true);

    // The pending session is not authenticated until the factor completes.
    let response = t.get("/api/auth/me", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Second authentication factor required");
}

#[tokio::test]
async fn test_claim_sets_password_and_allows_login() {
    let t = setup().await;
    let id = t
        .db
        .users()
        .create(CreateUserInput {
            login: "jane@acme.test",
            kind: UserKind::Portal,
            partner_id: None,
        })
        .await
        .unwrap();

    let token = t.invites.generate(id, "jane@acme.test").unwrap().token;
    let response = t
        .post_json(
            "/api/auth/claim",
            None,
            json!({ "token": token, "password": "longenough" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["login"], "jane@acme.test");

    t.login("jane@acme.test", "longenough").await;
}

#[tokio::test]
async fn test_claim_rejects_short_password() {
    let t = setup().await;
    let id = create_user(&t.db, "jane@acme.test", "old", UserKind::Portal).await;
    let token = t.invites.generate(id, "jane@acme.test").unwrap().token;

    let response = t
        .post_json(
            "/api/auth/claim",
            None,
            json!({ "token": token, "password": "short" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_claim_rejects_garbage_token() {
    let t = setup().await;
    let response = t
        .post_json(
            "/api/auth/claim",
            None,
            json!({ "token": "not-a-token", "password": "longenough" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_claim_rejects_token_for_deactivated_user() {
    let t = setup().await;
    let id = create_user(&t.db, "gone@test", "old-password", UserKind::Portal).await;
    let token = t.invites.generate(id, "gone@test").unwrap().token;
    t.db.users().set_active(id, false).await.unwrap();

    let response = t
        .post_json(
            "/api/auth/claim",
            None,
            json!({ "token": token, "password": "longenough" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[cfg(not(feature = "test-mode"))]
#[tokio::test]
async fn test_login_attempts_are_rate_limited() {
    let t = setup().await;

    // The per-IP bucket allows a burst of five; the sixth attempt trips it.
    for _ in 0..5 {
        let response = t
            .post_json(
                "/api/auth/login",
                None,
                json!({ "login": "ghost@test", "password": "nope" }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = t
        .post_json(
            "/api/auth/login",
            None,
            json!({ "login": "ghost@test", "password": "nope" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}
