//! Session-cookie authentication.
//!
//! Sessions are server-side rows keyed by an opaque `sid` cookie. A session
//! with `user_id` set is fully authenticated; one with only `pending_user_id`
//! set is waiting on a second factor. The same session row carries the
//! impersonation chain (see `crate::impersonate`).

mod cookie;
mod errors;
mod extractors;
mod password;
mod state;

pub use cookie::{SESSION_COOKIE_NAME, build_session_cookie, clear_session_cookie, get_cookie};
pub use errors::ApiAuthError;
pub use extractors::{AdminAuth, Auth, AuthenticatedUser, MaybeAuth};
pub use password::{hash_password, verify_password};
pub use state::HasAuthState;
