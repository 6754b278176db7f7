//! Admin-only listing endpoints.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::error::{ApiError, ResultExt};
use crate::auth::AdminAuth;
use crate::db::{Database, UserSummary};
use crate::impl_has_auth_state;

#[derive(Clone)]
pub struct AdminState {
    pub db: Database,
    pub secure_cookies: bool,
}

impl_has_auth_state!(AdminState);

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .with_state(state)
}

#[derive(Serialize)]
struct UsersResponse {
    users: Vec<UserSummary>,
}

async fn list_users(
    State(state): State<AdminState>,
    AdminAuth(_auth): AdminAuth,
) -> Result<Json<UsersResponse>, ApiError> {
    let users = state.db.users().list().await.db_err("Failed to list users")?;
    Ok(Json(UsersResponse { users }))
}
