//! Authentication state trait and macro.

use crate::db::Database;

/// Trait for state types that provide what the auth extractors need.
pub trait HasAuthState {
    fn db(&self) -> &Database;
    fn secure_cookies(&self) -> bool;
}

/// Macro to implement `HasAuthState` for state structs with the standard
/// fields.
///
/// The struct must have these fields:
/// - `db: Database`
/// - `secure_cookies: bool`
///
/// # Example
/// ```ignore
/// use crate::impl_has_auth_state;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub db: Database,
///     pub secure_cookies: bool,
///     // ... other fields
/// }
///
/// impl_has_auth_state!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_state {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthState for $state_type {
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
            fn secure_cookies(&self) -> bool {
                self.secure_cookies
            }
        }
    };
}
