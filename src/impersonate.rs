//! Admin impersonation with timed switch-back.
//!
//! An admin can re-authenticate their own session as any user without that
//! user's credentials. The session row tracks the origin user, an active
//! flag, and a start time; `switch_back` restores the origin within a fixed
//! ceiling and clears the chain on every exit path so a session can never be
//! left with a dangling active flag and no way back.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::{Database, SessionRecord, User};

/// Maximum impersonation duration: 4 hours.
pub const MAX_IMPERSONATION_SECS: i64 = 4 * 60 * 60;

#[derive(Debug)]
pub enum ImpersonateError {
    /// The session is not authenticated, so there is no origin to record.
    NotAuthenticated,
    /// The target user does not exist or is inactive.
    TargetNotFound(i64),
    Db(sqlx::Error),
}

impl std::fmt::Display for ImpersonateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImpersonateError::NotAuthenticated => write!(f, "Session is not authenticated"),
            ImpersonateError::TargetNotFound(id) => write!(f, "No active user with id {}", id),
            ImpersonateError::Db(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for ImpersonateError {}

impl From<sqlx::Error> for ImpersonateError {
    fn from(e: sqlx::Error) -> Self {
        ImpersonateError::Db(e)
    }
}

/// Controller owning the impersonate / switch-back lifecycle.
///
/// Holds the database by composition; the session framework is never patched,
/// every transition goes through this type.
#[derive(Clone)]
pub struct ImpersonationController {
    db: Database,
}

impl ImpersonationController {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Re-authenticate a session as `target_user_id` without credentials,
    /// recording the current identity as the impersonation origin.
    ///
    /// Starting again while already impersonating overwrites the tracked
    /// origin; only one level of return is kept.
    pub async fn impersonate(
        &self,
        session: &SessionRecord,
        target_user_id: i64,
    ) -> Result<(), ImpersonateError> {
        let origin_id = session.user_id.ok_or(ImpersonateError::NotAuthenticated)?;

        let target = self
            .db
            .users()
            .get_by_id(target_user_id)
            .await?
            .filter(|u| u.active)
            .ok_or(ImpersonateError::TargetNotFound(target_user_id))?;

        self.db
            .sessions()
            .set_impersonation(&session.sid, origin_id, unix_now())
            .await?;

        self.login_without_password(&session.sid, &target).await?;
        tracing::info!(
            origin = origin_id,
            target = target.id,
            "Impersonation started"
        );
        Ok(())
    }

    /// Whether the impersonation chain on this session is still within the
    /// 4-hour ceiling. Expiry eagerly clears the chain.
    pub async fn is_valid(&self, session: &SessionRecord, now: i64) -> Result<bool, sqlx::Error> {
        if !session.impersonation_active {
            return Ok(false);
        }
        let Some(started_at) = session.impersonation_started_at else {
            return Ok(false);
        };

        if now - started_at > MAX_IMPERSONATION_SECS {
            self.db.sessions().clear_impersonation(&session.sid).await?;
            return Ok(false);
        }

        Ok(true)
    }

    /// Revert the session to the origin user. Returns whether the original
    /// identity was restored.
    ///
    /// Every failure path clears the impersonation state; errors during
    /// re-authentication are logged here and never surfaced to the caller.
    pub async fn switch_back(&self, session: &SessionRecord) -> bool {
        let Some(origin_id) = session.impersonation_origin_id else {
            return false;
        };

        match self.is_valid(session, unix_now()).await {
            Ok(true) => {}
            Ok(false) => {
                self.clear(&session.sid).await;
                return false;
            }
            Err(e) => {
                tracing::error!(error = %e, "Validity check failed during switch-back");
                self.clear(&session.sid).await;
                return false;
            }
        }

        // Drop the origin before restoring it so a re-entrant call cannot
        // start a second restore.
        if let Err(e) = self
            .db
            .sessions()
            .clear_impersonation_origin(&session.sid)
            .await
        {
            tracing::error!(error = %e, "Failed to clear impersonation origin");
            self.clear(&session.sid).await;
            return false;
        }

        let origin = match self.db.users().get_by_id(origin_id).await {
            Ok(Some(user)) if user.active => user,
            Ok(_) => {
                tracing::error!(origin = origin_id, "Origin user missing during switch-back");
                self.clear(&session.sid).await;
                return false;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load origin user during switch-back");
                self.clear(&session.sid).await;
                return false;
            }
        };

        if let Err(e) = self.login_without_password(&session.sid, &origin).await {
            tracing::error!(error = %e, "Failed to restore origin identity");
            self.clear(&session.sid).await;
            return false;
        }

        self.clear(&session.sid).await;
        tracing::info!(origin = origin_id, "Switched back to origin user");
        true
    }

    /// Clear all impersonation state, swallowing (but logging) store errors
    /// so that callers on failure paths cannot fail again.
    pub async fn clear(&self, sid: &str) {
        if let Err(e) = self.db.sessions().clear_impersonation(sid).await {
            tracing::error!(error = %e, "Failed to clear impersonation state");
        }
    }

    /// Replace the session identity without credential verification. When the
    /// user requires a second factor the session is left pending; finalizing
    /// is deferred to the external factor (the skip-finalize branch).
    async fn login_without_password(&self, sid: &str, user: &User) -> Result<(), sqlx::Error> {
        if user.mfa_enabled {
            self.db.sessions().set_identity(sid, None, Some(user.id)).await?;
        } else {
            self.db.sessions().set_identity(sid, Some(user.id), None).await?;
        }
        Ok(())
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
