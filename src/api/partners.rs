//! Partner records: CRUD, followers, and the chatter endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ResultExt};
use crate::auth::{AdminAuth, Auth};
use crate::db::{Database, Message, Partner};
use crate::impl_has_auth_state;
use crate::notify;
use crate::portal::{PortalAccess, PortalService};

#[derive(Clone)]
pub struct PartnersState {
    pub db: Database,
    pub portal: PortalService,
    pub secure_cookies: bool,
}

impl_has_auth_state!(PartnersState);

pub fn router(state: PartnersState) -> Router {
    Router::new()
        .route("/", post(create_partner))
        .route("/{id}", get(get_partner))
        .route("/{id}/revoke-note", put(set_revoke_note))
        .route("/{id}/followers", post(add_follower))
        .route("/{id}/messages", post(post_message).get(list_messages))
        .with_state(state)
}

async fn load_partner(db: &Database, id: i64) -> Result<Partner, ApiError> {
    db.partners()
        .get_by_id(id)
        .await
        .db_err("Failed to load partner")?
        .ok_or_else(|| ApiError::not_found("Partner not found"))
}

#[derive(Deserialize)]
struct CreatePartnerRequest {
    name: String,
    email: Option<String>,
    parent_id: Option<i64>,
}

#[derive(Serialize)]
struct CreatePartnerResponse {
    id: i64,
}

async fn create_partner(
    State(state): State<PartnersState>,
    Auth(_auth): Auth,
    Json(payload): Json<CreatePartnerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Partner name cannot be empty"));
    }

    if let Some(parent_id) = payload.parent_id {
        load_partner(&state.db, parent_id).await?;
    }

    let id = state
        .db
        .partners()
        .create(name, payload.email.as_deref(), payload.parent_id)
        .await
        .db_err("Failed to create partner")?;

    Ok((StatusCode::CREATED, Json(CreatePartnerResponse { id })))
}

#[derive(Serialize)]
struct PartnerResponse {
    #[serde(flatten)]
    partner: Partner,
    portal_access: PortalAccess,
    portal_revoke_note: Option<String>,
}

async fn get_partner(
    State(state): State<PartnersState>,
    Auth(_auth): Auth,
    Path(id): Path<i64>,
) -> Result<Json<PartnerResponse>, ApiError> {
    let partner = load_partner(&state.db, id).await?;
    let portal_access = state
        .portal
        .status(&partner)
        .await
        .db_err("Failed to compute portal access")?;
    let portal_revoke_note = state
        .portal
        .revoke_note(&partner)
        .await
        .db_err("Failed to load revoke note")?;

    Ok(Json(PartnerResponse {
        partner,
        portal_access,
        portal_revoke_note,
    }))
}

#[derive(Deserialize)]
struct RevokeNoteRequest {
    note: Option<String>,
}

async fn set_revoke_note(
    State(state): State<PartnersState>,
    AdminAuth(_auth): AdminAuth,
    Path(id): Path<i64>,
    Json(payload): Json<RevokeNoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let partner = load_partner(&state.db, id).await?;
    let updated = state
        .portal
        .set_revoke_note(&partner, payload.note.as_deref())
        .await
        .db_err("Failed to store revoke note")?;

    if !updated {
        return Err(ApiError::not_found(
            "No user account exists for this partner",
        ));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct AddFollowerRequest {
    partner_id: i64,
}

async fn add_follower(
    State(state): State<PartnersState>,
    Auth(_auth): Auth,
    Path(id): Path<i64>,
    Json(payload): Json<AddFollowerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    load_partner(&state.db, id).await?;
    load_partner(&state.db, payload.partner_id).await?;

    state
        .db
        .messages()
        .add_follower(id, payload.partner_id)
        .await
        .db_err("Failed to add follower")?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct PostMessageRequest {
    body: String,
    #[serde(default)]
    exclude_partner_ids: Vec<i64>,
}

async fn post_message(
    State(state): State<PartnersState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
    Json(payload): Json<PostMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.body.trim().is_empty() {
        return Err(ApiError::bad_request("Message body cannot be empty"));
    }
    load_partner(&state.db, id).await?;

    let posted = notify::post_message(
        &state.db,
        id,
        &auth.user,
        &payload.body,
        &payload.exclude_partner_ids,
    )
    .await
    .db_err("Failed to post message")?;

    Ok((StatusCode::CREATED, Json(posted)))
}

#[derive(Serialize)]
struct MessagesResponse {
    messages: Vec<Message>,
}

async fn list_messages(
    State(state): State<PartnersState>,
    Auth(_auth): Auth,
    Path(id): Path<i64>,
) -> Result<Json<MessagesResponse>, ApiError> {
    load_partner(&state.db, id).await?;
    let messages = state
        .db
        .messages()
        .list_for_partner(id)
        .await
        .db_err("Failed to list messages")?;
    Ok(Json(MessagesResponse { messages }))
}
