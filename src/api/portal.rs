//! Portal grant / revoke / toggle endpoints.
//!
//! These always answer HTTP 200 with the structured `ActionResult`; failure
//! is reported in the body, not as an error status.

use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;

use crate::auth::AdminAuth;
use crate::db::Database;
use crate::impl_has_auth_state;
use crate::portal::{ActionResult, PortalService};

#[derive(Clone)]
pub struct PortalState {
    pub db: Database,
    pub portal: PortalService,
    pub secure_cookies: bool,
}

impl_has_auth_state!(PortalState);

pub fn router(state: PortalState) -> Router {
    Router::new()
        .route("/grant", post(grant))
        .route("/revoke", post(revoke))
        .route("/toggle", post(toggle))
        .with_state(state)
}

#[derive(Deserialize)]
struct GrantRequest {
    partner_id: i64,
    #[serde(default)]
    allow_change_partner: bool,
}

async fn grant(
    State(state): State<PortalState>,
    AdminAuth(_auth): AdminAuth,
    Json(payload): Json<GrantRequest>,
) -> Json<ActionResult> {
    Json(
        state
            .portal
            .grant(payload.partner_id, payload.allow_change_partner)
            .await,
    )
}

#[derive(Deserialize)]
struct RevokeRequest {
    partner_id: i64,
    note: Option<String>,
}

async fn revoke(
    State(state): State<PortalState>,
    AdminAuth(_auth): AdminAuth,
    Json(payload): Json<RevokeRequest>,
) -> Json<ActionResult> {
    Json(
        state
            .portal
            .revoke(payload.partner_id, payload.note.as_deref())
            .await,
    )
}

#[derive(Deserialize)]
struct ToggleRequest {
    partner_id: i64,
    #[serde(default)]
    confirmed: bool,
    note: Option<String>,
}

async fn toggle(
    State(state): State<PortalState>,
    AdminAuth(auth): AdminAuth,
    Json(payload): Json<ToggleRequest>,
) -> Json<ActionResult> {
    Json(
        state
            .portal
            .toggle(
                &auth.user,
                payload.partner_id,
                payload.confirmed,
                payload.note.as_deref(),
            )
            .await,
    )
}
