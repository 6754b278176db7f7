//! Cookie parsing and building for the session cookie.

use axum::http::header;

/// Cookie name for the browser session id.
pub const SESSION_COOKIE_NAME: &str = "frontdesk_session";

/// Session cookie lifetime: 7 days, matching the sessions table.
const SESSION_COOKIE_MAX_AGE: u64 = 7 * 24 * 60 * 60;

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Build the Set-Cookie value for a new session.
pub fn build_session_cookie(sid: &str, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}",
        SESSION_COOKIE_NAME, sid, SESSION_COOKIE_MAX_AGE, secure
    )
}

/// Build the Set-Cookie value that clears the session cookie.
pub fn clear_session_cookie(secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0{}",
        SESSION_COOKIE_NAME, secure
    )
}
