//! Authentication error types.

use axum::{
    http::header,
    response::{IntoResponse, Response},
};

use super::cookie::clear_session_cookie;

/// Internal auth error kind used by the core authentication logic.
#[derive(Debug)]
pub(super) enum AuthErrorKind {
    NotAuthenticated,
    FactorPending,
    UserNotFound,
    AccountDisabled,
    NotAdmin,
    DatabaseError,
}

/// API authentication error (returns JSON and clears the session cookie on
/// 401 so a dead sid is not resent forever).
#[derive(Debug)]
pub struct ApiAuthError {
    pub(super) kind: AuthErrorKind,
    pub(super) secure_cookies: bool,
}

impl ApiAuthError {
    pub(super) fn new(kind: AuthErrorKind, secure_cookies: bool) -> Self {
        Self {
            kind,
            secure_cookies,
        }
    }

    fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self.kind {
            AuthErrorKind::NotAuthenticated
            | AuthErrorKind::FactorPending
            | AuthErrorKind::UserNotFound => StatusCode::UNAUTHORIZED,
            AuthErrorKind::AccountDisabled | AuthErrorKind::NotAdmin => StatusCode::FORBIDDEN,
            AuthErrorKind::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::NotAuthenticated => "Not authenticated",
            AuthErrorKind::FactorPending => "Second authentication factor required",
            AuthErrorKind::UserNotFound => "User not found",
            AuthErrorKind::AccountDisabled => "Account disabled",
            AuthErrorKind::NotAdmin => "Administrator access required",
            AuthErrorKind::DatabaseError => "Database error",
        }
    }

    fn clears_cookie(&self) -> bool {
        matches!(
            self.kind,
            AuthErrorKind::NotAuthenticated | AuthErrorKind::UserNotFound
        )
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        use axum::Json;
        use axum::http::HeaderValue;
        use serde::Serialize;

        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        let mut response = (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response();

        if self.clears_cookie() {
            let clear = clear_session_cookie(self.secure_cookies);
            if let Ok(value) = HeaderValue::from_str(&clear) {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }

        response
    }
}
