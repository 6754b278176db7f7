mod common;

use axum::http::StatusCode;
use common::*;
use frontdesk::db::UserKind;
use serde_json::json;

async fn admin_cookie(t: &TestApp) -> String {
    create_admin(&t.db, "admin@test", "hunter2hunter2").await;
    t.login("admin@test", "hunter2hunter2").await
}

async fn create_partner(t: &TestApp, cookie: &str, name: &str, email: Option<&str>) -> i64 {
    let response = t
        .post_json(
            "/api/partners",
            Some(cookie),
            json!({ "name": name, "email": email }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_portal_endpoints_require_admin() {
    let t = setup().await;
    create_user(&t.db, "user@test", "password1", UserKind::Internal).await;
    let cookie = t.login("user@test", "password1").await;

    for path in ["/api/portal/grant", "/api/portal/revoke", "/api/portal/toggle"] {
        let response = t
            .post_json(path, Some(&cookie), json!({ "partner_id": 1 }))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", path);
    }
}

#[tokio::test]
async fn test_grant_then_partner_shows_active_access() {
    let t = setup().await;
    let cookie = admin_cookie(&t).await;
    let partner = create_partner(&t, &cookie, "Jane", Some("jane@acme.test")).await;

    let response = t
        .post_json(
            "/api/portal/grant",
            Some(&cookie),
            json!({ "partner_id": partner }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["portal_access"], "active");
    assert_eq!(body["partner_id"], partner);

    let response = t
        .get(&format!("/api/partners/{}", partner), Some(&cookie))
        .await;
    let body = body_json(response).await;
    assert_eq!(body["portal_access"], "active");
    assert_eq!(body["name"], "Jane");
}

#[tokio::test]
async fn test_grant_without_email_reports_failure_with_200() {
    let t = setup().await;
    let cookie = admin_cookie(&t).await;
    let partner = create_partner(&t, &cookie, "No Mail", None).await;

    let response = t
        .post_json(
            "/api/portal/grant",
            Some(&cookie),
            json!({ "partner_id": partner }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["portal_access"], "none");
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("does not have an email address")
    );
}

#[tokio::test]
async fn test_grant_unknown_partner_reports_failure() {
    let t = setup().await;
    let cookie = admin_cookie(&t).await;

    let response = t
        .post_json(
            "/api/portal/grant",
            Some(&cookie),
            json!({ "partner_id": 9999 }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("9999"));
}

#[tokio::test]
async fn test_revoke_stores_note_and_partner_shows_it() {
    let t = setup().await;
    let cookie = admin_cookie(&t).await;
    let partner = create_partner(&t, &cookie, "Jane", Some("jane@acme.test")).await;

    t.post_json(
        "/api/portal/grant",
        Some(&cookie),
        json!({ "partner_id": partner }),
    )
    .await;

    let response = t
        .post_json(
            "/api/portal/revoke",
            Some(&cookie),
            json!({ "partner_id": partner, "note": "contract ended" }),
        )
        .await;
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["portal_access"], "revoked");

    let response = t
        .get(&format!("/api/partners/{}", partner), Some(&cookie))
        .await;
    let body = body_json(response).await;
    assert_eq!(body["portal_access"], "revoked");
    assert_eq!(body["portal_revoke_note"], "contract ended");
}

#[tokio::test]
async fn test_toggle_requires_confirmation() {
    let t = setup().await;
    let cookie = admin_cookie(&t).await;
    let partner = create_partner(&t, &cookie, "Jane", Some("jane@acme.test")).await;

    let response = t
        .post_json(
            "/api/portal/toggle",
            Some(&cookie),
            json!({ "partner_id": partner }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("Confirmation required")
    );
}

#[tokio::test]
async fn test_toggle_flips_access_and_posts_audit() {
    let t = setup().await;
    let cookie = admin_cookie(&t).await;
    let partner = create_partner(&t, &cookie, "Jane", Some("jane@acme.test")).await;

    let response = t
        .post_json(
            "/api/portal/toggle",
            Some(&cookie),
            json!({ "partner_id": partner, "confirmed": true }),
        )
        .await;
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["portal_access"], "active");

    let response = t
        .post_json(
            "/api/portal/toggle",
            Some(&cookie),
            json!({ "partner_id": partner, "confirmed": true, "note": "offboarded" }),
        )
        .await;
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["portal_access"], "revoked");

    let response = t
        .get(&format!("/api/partners/{}/messages", partner), Some(&cookie))
        .await;
    let body = body_json(response).await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert!(
        messages[0]["body"]
            .as_str()
            .unwrap()
            .contains("granted by admin@test")
    );
    assert!(messages[1]["body"].as_str().unwrap().contains("offboarded"));
}

#[tokio::test]
async fn test_revoke_note_endpoint() {
    let t = setup().await;
    let cookie = admin_cookie(&t).await;
    let partner = create_partner(&t, &cookie, "Jane", Some("jane@acme.test")).await;

    // No user account yet: nothing to write the note to.
    let response = t
        .put_json(
            &format!("/api/partners/{}/revoke-note", partner),
            Some(&cookie),
            json!({ "note": "n" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    t.post_json(
        "/api/portal/grant",
        Some(&cookie),
        json!({ "partner_id": partner }),
    )
    .await;

    let response = t
        .put_json(
            &format!("/api/partners/{}/revoke-note", partner),
            Some(&cookie),
            json!({ "note": "watch this account" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = t
        .get(&format!("/api/partners/{}", partner), Some(&cookie))
        .await;
    let body = body_json(response).await;
    assert_eq!(body["portal_revoke_note"], "watch this account");
}
