//! Login, logout, current-user, and invite claiming.

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use crate::auth::{
    Auth, SESSION_COOKIE_NAME, build_session_cookie, clear_session_cookie, get_cookie,
    hash_password, verify_password,
};
use crate::db::Database;
use crate::impl_has_auth_state;
use crate::invite::InviteConfig;
use crate::rate_limit::{RateLimitConfig, rate_limit_claim, rate_limit_login};

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub invites: InviteConfig,
    pub secure_cookies: bool,
    pub rate_limit: Arc<RateLimitConfig>,
}

impl_has_auth_state!(AuthState);

pub fn router(state: AuthState) -> Router {
    let login_routes = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit.clone(),
            rate_limit_login,
        ));

    let claim_routes = Router::new()
        .route("/claim", post(claim))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit.clone(),
            rate_limit_claim,
        ));

    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
        .with_state(state)
        .merge(login_routes)
        .merge(claim_routes)
}

#[derive(Deserialize)]
struct LoginRequest {
    login: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    /// True when a second factor is still required to finalize.
    pending: bool,
}

async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_login(payload.login.trim())
        .await
        .db_err("Failed to look up user")?;

    // One rejection path for unknown logins, unclaimed accounts, and wrong
    // passwords, so responses do not reveal which login exists.
    let user = match user {
        Some(user) => user,
        None => return Err(ApiError::unauthorized("Invalid login or password")),
    };
    let valid = user
        .password_hash
        .as_deref()
        .map(|hash| verify_password(hash, &payload.password))
        .unwrap_or(false);
    if !valid {
        return Err(ApiError::unauthorized("Invalid login or password"));
    }

    let sid = uuid::Uuid::new_v4().to_string();
    let pending = user.mfa_enabled;
    if pending {
        // Skip-finalize branch: the external factor promotes the identity.
        state
            .db
            .sessions()
            .create(&sid, None, Some(user.id))
            .await
            .db_err("Failed to create session")?;
    } else {
        state
            .db
            .sessions()
            .create(&sid, Some(user.id), None)
            .await
            .db_err("Failed to create session")?;
    }

    tracing::info!(login = %user.login, pending, "Login");

    let cookie = build_session_cookie(&sid, state.secure_cookies);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse { pending }),
    ))
}

async fn logout(
    State(state): State<AuthState>,
    headers: axum::http::HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(sid) = get_cookie(&headers, SESSION_COOKIE_NAME) {
        state
            .db
            .sessions()
            .delete_by_sid(sid)
            .await
            .db_err("Failed to delete session")?;
    }

    let cookie = clear_session_cookie(state.secure_cookies);
    Ok(([(header::SET_COOKIE, cookie)], StatusCode::NO_CONTENT))
}

#[derive(Serialize)]
struct MeResponse {
    id: i64,
    login: String,
    kind: crate::db::UserKind,
    admin: bool,
    partner_id: Option<i64>,
    impersonating: bool,
}

async fn me(Auth(auth): Auth) -> Json<MeResponse> {
    Json(MeResponse {
        id: auth.user.id,
        login: auth.user.login,
        kind: auth.user.kind,
        admin: auth.user.admin,
        partner_id: auth.user.partner_id,
        impersonating: auth.session.impersonation_active,
    })
}

#[derive(Deserialize)]
struct ClaimRequest {
    token: String,
    password: String,
}

#[derive(Serialize)]
struct ClaimResponse {
    login: String,
}

/// Consume an invite token and set the account's password.
async fn claim(
    State(state): State<AuthState>,
    Json(payload): Json<ClaimRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.password.len() < 8 {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }

    let claims = state
        .invites
        .validate(&payload.token)
        .map_err(|_| ApiError::unauthorized("Invalid or expired invite token"))?;

    let user = state
        .db
        .users()
        .get_by_id(claims.sub)
        .await
        .db_err("Failed to look up user")?
        .filter(|u| u.active && u.login.eq_ignore_ascii_case(&claims.login))
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired invite token"))?;

    let hash = hash_password(&payload.password).map_err(|e| {
        tracing::error!(error = %e, "Failed to hash password");
        ApiError::internal("Failed to set password")
    })?;

    state
        .db
        .users()
        .set_password_hash(user.id, &hash)
        .await
        .db_err("Failed to set password")?;

    tracing::info!(login = %user.login, "Invite claimed");
    Ok(Json(ClaimResponse { login: user.login }))
}
