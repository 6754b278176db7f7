mod attachment;
mod message;
mod partner;
mod session;
mod user;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use attachment::{Attachment, AttachmentStore, CreateAttachmentInput};
pub use message::{Message, MessageStore};
pub use partner::{Partner, PartnerStore};
pub use session::{SessionRecord, SessionStore};
pub use user::{CreateUserInput, User, UserKind, UserStore, UserSummary};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        if version < 2 {
            self.migrate_v2().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                // Partners table (contacts; portal access is granted per partner)
                "CREATE TABLE partners (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    email TEXT,
                    parent_id INTEGER REFERENCES partners(id) ON DELETE SET NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_partners_email ON partners(email)",
                "CREATE INDEX idx_partners_parent_id ON partners(parent_id)",
                // Users table. `kind` is the mutually exclusive primary group;
                // portal and public users are "share" users (non-employees).
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    login TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    password_hash TEXT,
                    kind TEXT NOT NULL DEFAULT 'internal',
                    admin INTEGER NOT NULL DEFAULT 0,
                    active INTEGER NOT NULL DEFAULT 1,
                    mfa_enabled INTEGER NOT NULL DEFAULT 0,
                    partner_id INTEGER REFERENCES partners(id) ON DELETE SET NULL,
                    portal_revoke_note TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_users_login ON users(login)",
                "CREATE INDEX idx_users_active ON users(active)",
                "CREATE INDEX idx_users_partner_id ON users(partner_id)",
                // Browser sessions. user_id is NULL while a second factor is
                // pending; the impersonation columns track the switch-back chain.
                "CREATE TABLE sessions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    sid TEXT UNIQUE NOT NULL,
                    user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
                    pending_user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
                    impersonation_origin_id INTEGER,
                    impersonation_active INTEGER NOT NULL DEFAULT 0,
                    impersonation_started_at INTEGER,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    expires_at TEXT NOT NULL
                )",
                "CREATE INDEX idx_sessions_sid ON sessions(sid)",
                "CREATE INDEX idx_sessions_expires_at ON sessions(expires_at)",
                // Attachment metadata; file bytes live in the filestore on disk.
                "CREATE TABLE attachments (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    mimetype TEXT NOT NULL DEFAULT 'application/octet-stream',
                    store_fname TEXT NOT NULL,
                    size INTEGER NOT NULL,
                    checksum TEXT NOT NULL,
                    partner_id INTEGER REFERENCES partners(id) ON DELETE SET NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_attachments_partner_id ON attachments(partner_id)",
            ],
        )
        .await
    }

    async fn migrate_v2(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            2,
            &[
                // Partner chatter messages
                "CREATE TABLE messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    partner_id INTEGER NOT NULL REFERENCES partners(id) ON DELETE CASCADE,
                    author_id INTEGER NOT NULL REFERENCES users(id),
                    body TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_messages_partner_id ON messages(partner_id)",
                // Partners following a record's chatter
                "CREATE TABLE followers (
                    partner_id INTEGER NOT NULL REFERENCES partners(id) ON DELETE CASCADE,
                    follower_partner_id INTEGER NOT NULL REFERENCES partners(id) ON DELETE CASCADE,
                    PRIMARY KEY (partner_id, follower_partner_id)
                )",
                // One row per recipient that survived exclusion filtering
                "CREATE TABLE notifications (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    message_id INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                    recipient_partner_id INTEGER NOT NULL REFERENCES partners(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_notifications_message_id ON notifications(message_id)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the partner store.
    pub fn partners(&self) -> PartnerStore {
        PartnerStore::new(self.pool.clone())
    }

    /// Get the session store.
    pub fn sessions(&self) -> SessionStore {
        SessionStore::new(self.pool.clone())
    }

    /// Get the attachment store.
    pub fn attachments(&self) -> AttachmentStore {
        AttachmentStore::new(self.pool.clone())
    }

    /// Get the message store (chatter, followers, notifications).
    pub fn messages(&self) -> MessageStore {
        MessageStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
