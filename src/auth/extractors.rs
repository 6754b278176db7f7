//! Axum extractors for session authentication.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::cookie::{SESSION_COOKIE_NAME, get_cookie};
use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthState;
use crate::db::{SessionRecord, User};

/// An authenticated user with its backing session row.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub session: SessionRecord,
}

/// Core authentication logic shared by all extractors: resolve the sid
/// cookie to an unexpired, finalized session and load its user.
async fn authenticate_request<S>(
    parts: &Parts,
    state: &S,
) -> Result<AuthenticatedUser, AuthErrorKind>
where
    S: HasAuthState + Send + Sync,
{
    let sid =
        get_cookie(&parts.headers, SESSION_COOKIE_NAME).ok_or(AuthErrorKind::NotAuthenticated)?;

    let session = state
        .db()
        .sessions()
        .get_by_sid(sid)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load session");
            AuthErrorKind::DatabaseError
        })?
        .ok_or(AuthErrorKind::NotAuthenticated)?;

    // A pending session has an identity waiting on a second factor; it is
    // not authenticated yet.
    let user_id = match session.user_id {
        Some(id) => id,
        None if session.pending_user_id.is_some() => return Err(AuthErrorKind::FactorPending),
        None => return Err(AuthErrorKind::NotAuthenticated),
    };

    let user = state
        .db()
        .users()
        .get_by_id(user_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load user");
            AuthErrorKind::DatabaseError
        })?
        .ok_or(AuthErrorKind::UserNotFound)?;

    if !user.active {
        return Err(AuthErrorKind::AccountDisabled);
    }

    Ok(AuthenticatedUser { user, session })
}

/// Extractor for endpoints that require an authenticated session.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_request(parts, state)
            .await
            .map(Auth)
            .map_err(|kind| ApiAuthError::new(kind, state.secure_cookies()))
    }
}

/// Extractor for endpoints restricted to administrators.
pub struct AdminAuth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for AdminAuth
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Auth(auth) = Auth::from_request_parts(parts, state).await?;
        if !auth.user.admin {
            return Err(ApiAuthError::new(
                AuthErrorKind::NotAdmin,
                state.secure_cookies(),
            ));
        }
        Ok(AdminAuth(auth))
    }
}

/// Optional authentication extractor - never fails.
/// Useful for endpoints that work both authenticated and unauthenticated.
pub struct MaybeAuth(pub Option<AuthenticatedUser>);

impl<S> FromRequestParts<S> for MaybeAuth
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuth(authenticate_request(parts, state).await.ok()))
    }
}
