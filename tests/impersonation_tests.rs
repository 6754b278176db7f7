mod common;

use axum::http::{StatusCode, header};
use common::*;
use frontdesk::db::UserKind;

#[tokio::test]
async fn test_admin_impersonates_and_switches_back() {
    let t = setup().await;
    let admin_id = create_admin(&t.db, "admin@test", "hunter2hunter2").await;
    let target_id = create_user(&t.db, "jane@test", "password1", UserKind::Portal).await;
    let cookie = t.login("admin@test", "hunter2hunter2").await;

    let response = t
        .post_empty(&format!("/impersonate/{}", target_id), Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/web"
    );

    // The same session now acts as the target.
    let response = t.get("/api/auth/me", Some(&cookie)).await;
    let body = body_json(response).await;
    assert_eq!(body["id"], target_id);
    assert_eq!(body["impersonating"], true);

    let response = t.get("/switch/back", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/web"
    );

    let response = t.get("/api/auth/me", Some(&cookie)).await;
    let body = body_json(response).await;
    assert_eq!(body["id"], admin_id);
    assert_eq!(body["impersonating"], false);
}

#[tokio::test]
async fn test_non_admin_cannot_impersonate() {
    let t = setup().await;
    create_user(&t.db, "user@test", "password1", UserKind::Internal).await;
    let other = create_user(&t.db, "other@test", "password1", UserKind::Portal).await;
    let cookie = t.login("user@test", "password1").await;

    let response = t
        .post_empty(&format!("/impersonate/{}", other), Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_impersonating_self_is_rejected() {
    let t = setup().await;
    let admin_id = create_admin(&t.db, "admin@test", "hunter2hunter2").await;
    let cookie = t.login("admin@test", "hunter2hunter2").await;

    let response = t
        .post_empty(&format!("/impersonate/{}", admin_id), Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_impersonating_unknown_target_is_not_found() {
    let t = setup().await;
    create_admin(&t.db, "admin@test", "hunter2hunter2").await;
    let cookie = t.login("admin@test", "hunter2hunter2").await;

    let response = t.post_empty("/impersonate/9999", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_impersonating_inactive_target_is_not_found() {
    let t = setup().await;
    create_admin(&t.db, "admin@test", "hunter2hunter2").await;
    let target = create_user(&t.db, "gone@test", "password1", UserKind::Portal).await;
    t.db.users().set_active(target, false).await.unwrap();
    let cookie = t.login("admin@test", "hunter2hunter2").await;

    let response = t
        .post_empty(&format!("/impersonate/{}", target), Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_switch_back_without_impersonation_just_redirects() {
    let t = setup().await;
    let admin_id = create_admin(&t.db, "admin@test", "hunter2hunter2").await;
    let cookie = t.login("admin@test", "hunter2hunter2").await;

    let response = t.get("/switch/back", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = t.get("/api/auth/me", Some(&cookie)).await;
    let body = body_json(response).await;
    assert_eq!(body["id"], admin_id);
}

#[tokio::test]
async fn test_switch_back_without_session_just_redirects() {
    let t = setup().await;
    let response = t.get("/switch/back", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_switch_user_reports_privilege() {
    let t = setup().await;
    create_admin(&t.db, "admin@test", "hunter2hunter2").await;
    create_user(&t.db, "user@test", "password1", UserKind::Internal).await;

    let admin_cookie = t.login("admin@test", "hunter2hunter2").await;
    let response = t.get("/api/switch/user", Some(&admin_cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!(true));

    let user_cookie = t.login("user@test", "password1").await;
    let response = t.get("/api/switch/user", Some(&user_cookie)).await;
    assert_eq!(body_json(response).await, serde_json::json!(false));

    // Unauthenticated callers get false, not an error.
    let response = t.get("/api/switch/user", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!(false));
}

#[tokio::test]
async fn test_expired_impersonation_cannot_switch_back() {
    let t = setup().await;
    create_admin(&t.db, "admin@test", "hunter2hunter2").await;
    let target = create_user(&t.db, "jane@test", "password1", UserKind::Portal).await;
    let cookie = t.login("admin@test", "hunter2hunter2").await;

    let response = t
        .post_empty(&format!("/impersonate/{}", target), Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    // Move the start time five hours into the past, beyond the ceiling.
    let five_hours_ago = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
        - 5 * 60 * 60;
    sqlx::query("UPDATE sessions SET impersonation_started_at = ?")
        .bind(five_hours_ago)
        .execute(t.db.pool())
        .await
        .unwrap();

    let response = t.get("/switch/back", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    // Identity stays with the target; the stale chain is cleared.
    let response = t.get("/api/auth/me", Some(&cookie)).await;
    let body = body_json(response).await;
    assert_eq!(body["id"], target);
    assert_eq!(body["impersonating"], false);
}

#[tokio::test]
async fn test_impersonating_mfa_user_leaves_session_pending() {
    let t = setup().await;
    create_admin(&t.db, "admin@test", "hunter2hunter2").await;
    let target = create_user(&t.db, "mfa@test", "password1", UserKind::Internal).await;
    t.db.users().set_mfa_enabled(target, true).await.unwrap();
    let cookie = t.login("admin@test", "hunter2hunter2").await;

    let response = t
        .post_empty(&format!("/impersonate/{}", target), Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    // The second factor still gates the target identity.
    let response = t.get("/api/auth/me", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Second authentication factor required");
}
