//! Server-side browser session storage.
//!
//! Each browser session is one row keyed by the `sid` cookie value. The row
//! also carries the impersonation chain (origin user, active flag, start
//! time) so that every exit path can clear it in one place. Sessions live for
//! seven days; expired rows are swept by the cleanup task.

use sqlx::sqlite::SqlitePool;

/// A browser session row.
///
/// `user_id` is the authenticated identity; it is NULL while a second
/// authentication factor is pending, in which case `pending_user_id` holds
/// the identity waiting to be finalized.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: i64,
    pub sid: String,
    pub user_id: Option<i64>,
    pub pending_user_id: Option<i64>,
    pub impersonation_origin_id: Option<i64>,
    pub impersonation_active: bool,
    pub impersonation_started_at: Option<i64>,
    pub created_at: String,
    pub expires_at: String,
}

impl SessionRecord {
    /// Whether the session is fully authenticated (no factor pending).
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: i64,
    sid: String,
    user_id: Option<i64>,
    pending_user_id: Option<i64>,
    impersonation_origin_id: Option<i64>,
    impersonation_active: i32,
    impersonation_started_at: Option<i64>,
    created_at: String,
    expires_at: String,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            sid: row.sid,
            user_id: row.user_id,
            pending_user_id: row.pending_user_id,
            impersonation_origin_id: row.impersonation_origin_id,
            impersonation_active: row.impersonation_active != 0,
            impersonation_started_at: row.impersonation_started_at,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

/// Store for browser sessions.
#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a session. Exactly one of `user_id` / `pending_user_id` should
    /// be set: `user_id` for a finalized login, `pending_user_id` when a
    /// second factor still has to complete.
    pub async fn create(
        &self,
        sid: &str,
        user_id: Option<i64>,
        pending_user_id: Option<i64>,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO sessions (sid, user_id, pending_user_id, expires_at) VALUES (?, ?, ?, datetime('now', '+7 days'))",
        )
        .bind(sid)
        .bind(user_id)
        .bind(pending_user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Look up an unexpired session by its cookie value.
    pub async fn get_by_sid(&self, sid: &str) -> Result<Option<SessionRecord>, sqlx::Error> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT id, sid, user_id, pending_user_id, impersonation_origin_id, impersonation_active, impersonation_started_at, created_at, expires_at
             FROM sessions WHERE sid = ? AND expires_at > datetime('now')",
        )
        .bind(sid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SessionRecord::from))
    }

    /// Replace the session identity without touching the impersonation
    /// columns. Passing `user_id = None` with a pending id models the
    /// not-yet-finalized state.
    pub async fn set_identity(
        &self,
        sid: &str,
        user_id: Option<i64>,
        pending_user_id: Option<i64>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE sessions SET user_id = ?, pending_user_id = ? WHERE sid = ?")
            .bind(user_id)
            .bind(pending_user_id)
            .bind(sid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Promote the pending identity to the authenticated one.
    pub async fn finalize(&self, sid: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET user_id = pending_user_id, pending_user_id = NULL
             WHERE sid = ? AND pending_user_id IS NOT NULL",
        )
        .bind(sid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record the impersonation chain: origin user, active flag, start time.
    pub async fn set_impersonation(
        &self,
        sid: &str,
        origin_user_id: i64,
        started_at: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET impersonation_origin_id = ?, impersonation_active = 1, impersonation_started_at = ? WHERE sid = ?",
        )
        .bind(origin_user_id)
        .bind(started_at)
        .bind(sid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear only the tracked origin. Done first during switch-back so a
    /// re-entrant call cannot start a second restore.
    pub async fn clear_impersonation_origin(&self, sid: &str) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE sessions SET impersonation_origin_id = NULL WHERE sid = ?")
                .bind(sid)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear all impersonation state.
    pub async fn clear_impersonation(&self, sid: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET impersonation_origin_id = NULL, impersonation_active = 0, impersonation_started_at = NULL WHERE sid = ?",
        )
        .bind(sid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a session (logout).
    pub async fn delete_by_sid(&self, sid: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE sid = ?")
            .bind(sid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all expired sessions.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= datetime('now')")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete pending sessions whose second factor never completed.
    pub async fn delete_stale_pending(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM sessions WHERE user_id IS NULL AND pending_user_id IS NOT NULL AND created_at < datetime('now', '-15 minutes')",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[tokio::test]
    async fn test_create_and_get_session() {
        let db = Database::open(":memory:").await.unwrap();

        db.sessions().create("sid-1", Some(7), None).await.unwrap();

        let session = db.sessions().get_by_sid("sid-1").await.unwrap().unwrap();
        assert_eq!(session.user_id, Some(7));
        assert!(session.is_authenticated());
        assert!(!session.impersonation_active);
        assert!(session.impersonation_origin_id.is_none());
        assert!(session.impersonation_started_at.is_none());
    }

    #[tokio::test]
    async fn test_pending_session_finalize() {
        let db = Database::open(":memory:").await.unwrap();

        db.sessions().create("sid-2", None, Some(9)).await.unwrap();

        let session = db.sessions().get_by_sid("sid-2").await.unwrap().unwrap();
        assert!(!session.is_authenticated());
        assert_eq!(session.pending_user_id, Some(9));

        assert!(db.sessions().finalize("sid-2").await.unwrap());
        let session = db.sessions().get_by_sid("sid-2").await.unwrap().unwrap();
        assert_eq!(session.user_id, Some(9));
        assert!(session.pending_user_id.is_none());
    }

    #[tokio::test]
    async fn test_impersonation_fields_roundtrip() {
        let db = Database::open(":memory:").await.unwrap();

        db.sessions().create("sid-3", Some(1), None).await.unwrap();
        db.sessions()
            .set_impersonation("sid-3", 1, 1_700_000_000)
            .await
            .unwrap();

        let session = db.sessions().get_by_sid("sid-3").await.unwrap().unwrap();
        assert!(session.impersonation_active);
        assert_eq!(session.impersonation_origin_id, Some(1));
        assert_eq!(session.impersonation_started_at, Some(1_700_000_000));

        db.sessions().clear_impersonation("sid-3").await.unwrap();
        let session = db.sessions().get_by_sid("sid-3").await.unwrap().unwrap();
        assert!(!session.impersonation_active);
        assert!(session.impersonation_origin_id.is_none());
        assert!(session.impersonation_started_at.is_none());
    }

    #[tokio::test]
    async fn test_expired_session_not_returned() {
        let db = Database::open(":memory:").await.unwrap();

        db.sessions().create("sid-4", Some(1), None).await.unwrap();
        sqlx::query("UPDATE sessions SET expires_at = datetime('now', '-1 hour') WHERE sid = ?")
            .bind("sid-4")
            .execute(db.pool())
            .await
            .unwrap();

        assert!(db.sessions().get_by_sid("sid-4").await.unwrap().is_none());
        assert_eq!(db.sessions().delete_expired().await.unwrap(), 1);
    }
}
