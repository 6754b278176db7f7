//! Impersonation routes.
//!
//! `/api/switch/user` answers whether the current actor is privileged. The
//! browser-facing routes start an impersonation and switch back; both end in
//! a 303 redirect to the web root, and switch-back never surfaces internal
//! error detail.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
};

use super::error::ApiError;
use crate::auth::{AdminAuth, MaybeAuth};
use crate::db::Database;
use crate::impersonate::{ImpersonateError, ImpersonationController};
use crate::impl_has_auth_state;

#[derive(Clone)]
pub struct ImpersonateState {
    pub db: Database,
    pub controller: ImpersonationController,
    pub secure_cookies: bool,
    /// Redirect target after starting or ending an impersonation.
    pub web_root: String,
}

impl_has_auth_state!(ImpersonateState);

/// Routes mounted under `/api/switch`.
pub fn api_router(state: ImpersonateState) -> Router {
    Router::new()
        .route("/user", get(is_privileged))
        .with_state(state)
}

/// Browser-facing routes mounted at the application root.
pub fn web_router(state: ImpersonateState) -> Router {
    Router::new()
        .route("/impersonate/{user_id}", post(start))
        .route("/switch/back", get(switch_back))
        .with_state(state)
}

/// Whether the current actor is an admin; false when unauthenticated.
async fn is_privileged(MaybeAuth(auth): MaybeAuth) -> Json<bool> {
    Json(auth.map(|a| a.user.admin).unwrap_or(false))
}

async fn start(
    State(state): State<ImpersonateState>,
    AdminAuth(auth): AdminAuth,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if Some(user_id) == auth.session.user_id {
        return Err(ApiError::bad_request("Already operating as this user"));
    }

    match state.controller.impersonate(&auth.session, user_id).await {
        Ok(()) => Ok(Redirect::to(&state.web_root)),
        Err(ImpersonateError::TargetNotFound(_)) => Err(ApiError::not_found("User not found")),
        Err(ImpersonateError::NotAuthenticated) => {
            Err(ApiError::unauthorized("Not authenticated"))
        }
        Err(ImpersonateError::Db(e)) => Err(ApiError::db_error("Failed to start impersonation", e)),
    }
}

/// Revert to the origin user. Redirects to the web root on every path.
async fn switch_back(
    State(state): State<ImpersonateState>,
    headers: axum::http::HeaderMap,
) -> Redirect {
    let redirect = Redirect::to(&state.web_root);

    let Some(sid) = crate::auth::get_cookie(&headers, crate::auth::SESSION_COOKIE_NAME) else {
        return redirect;
    };
    let session = match state.db.sessions().get_by_sid(sid).await {
        Ok(Some(session)) => session,
        Ok(None) => return redirect,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load session during switch-back");
            return redirect;
        }
    };

    if session.impersonation_origin_id.is_none() {
        return redirect;
    }

    // switch_back logs failures internally and clears state on every path.
    let _ = state.controller.switch_back(&session).await;
    redirect
}
