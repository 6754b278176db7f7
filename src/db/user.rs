use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// Primary group of a user account. The three kinds are mutually exclusive:
/// internal users are employees, portal and public users are external
/// ("share") accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserKind {
    Internal,
    Portal,
    Public,
}

impl UserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserKind::Internal => "internal",
            UserKind::Portal => "portal",
            UserKind::Public => "public",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "portal" => UserKind::Portal,
            "public" => UserKind::Public,
            _ => UserKind::Internal,
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub password_hash: Option<String>,
    pub kind: UserKind,
    pub admin: bool,
    pub active: bool,
    pub mfa_enabled: bool,
    pub partner_id: Option<i64>,
    pub portal_revoke_note: Option<String>,
}

impl User {
    /// External (non-employee) account: portal or public.
    pub fn is_share(&self) -> bool {
        self.kind != UserKind::Internal
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    login: String,
    password_hash: Option<String>,
    kind: String,
    admin: i32,
    active: i32,
    mfa_enabled: i32,
    partner_id: Option<i64>,
    portal_revoke_note: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            login: row.login,
            password_hash: row.password_hash,
            kind: UserKind::from_str(&row.kind),
            admin: row.admin != 0,
            active: row.active != 0,
            mfa_enabled: row.mfa_enabled != 0,
            partner_id: row.partner_id,
            portal_revoke_note: row.portal_revoke_note,
        }
    }
}

/// User summary for the admin listing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub login: String,
    pub kind: UserKind,
    pub admin: bool,
    pub active: bool,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct UserSummaryRow {
    id: i64,
    login: String,
    kind: String,
    admin: i32,
    active: i32,
    created_at: String,
}

impl From<UserSummaryRow> for UserSummary {
    fn from(row: UserSummaryRow) -> Self {
        Self {
            id: row.id,
            login: row.login,
            kind: UserKind::from_str(&row.kind),
            admin: row.admin != 0,
            active: row.active != 0,
            created_at: row.created_at,
        }
    }
}

/// Fields for creating a user account. The account starts active and without
/// a password; portal users set one through the invite claim flow.
pub struct CreateUserInput<'a> {
    pub login: &'a str,
    pub kind: UserKind,
    pub partner_id: Option<i64>,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user account. Returns the user ID.
    pub async fn create(&self, input: CreateUserInput<'_>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO users (login, kind, partner_id) VALUES (?, ?, ?)")
            .bind(input.login)
            .bind(input.kind.as_str())
            .bind(input.partner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Create an internal admin user with a password hash (startup bootstrap).
    pub async fn create_admin(
        &self,
        login: &str,
        password_hash: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO users (login, password_hash, kind, admin) VALUES (?, ?, 'internal', 1)",
        )
        .bind(login)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a user by ID, regardless of active state.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, login, password_hash, kind, admin, active, mfa_enabled, partner_id, portal_revoke_note FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Get an active user by login.
    pub async fn get_by_login(&self, login: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, login, password_hash, kind, admin, active, mfa_enabled, partner_id, portal_revoke_note FROM users WHERE login = ? AND active = 1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by login, including inactive accounts.
    /// The portal module needs this to detect revoked accounts.
    pub async fn get_by_login_any(&self, login: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, login, password_hash, kind, admin, active, mfa_enabled, partner_id, portal_revoke_note FROM users WHERE login = ?",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Get the active portal user linked to a partner, if any.
    pub async fn find_active_portal_for_partner(
        &self,
        partner_id: i64,
    ) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, login, password_hash, kind, admin, active, mfa_enabled, partner_id, portal_revoke_note FROM users WHERE partner_id = ? AND kind = 'portal' AND active = 1 LIMIT 1",
        )
        .bind(partner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Activate or deactivate a user.
    pub async fn set_active(&self, id: i64, active: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET active = ? WHERE id = ?")
            .bind(active as i32)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a user to a different primary group.
    pub async fn set_kind(&self, id: i64, kind: UserKind) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET kind = ? WHERE id = ?")
            .bind(kind.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Re-link a user to a partner record.
    pub async fn set_partner(&self, id: i64, partner_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET partner_id = ? WHERE id = ?")
            .bind(partner_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set the password hash (invite claim or admin reset).
    pub async fn set_password_hash(&self, id: i64, hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Store or clear the portal revocation note.
    pub async fn set_revoke_note(
        &self,
        id: i64,
        note: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET portal_revoke_note = ? WHERE id = ?")
            .bind(note)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Enable or disable the second authentication factor for a user.
    pub async fn set_mfa_enabled(&self, id: i64, enabled: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET mfa_enabled = ? WHERE id = ?")
            .bind(enabled as i32)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List all users, active and inactive (for the admin dashboard).
    pub async fn list(&self) -> Result<Vec<UserSummary>, sqlx::Error> {
        let rows: Vec<UserSummaryRow> = sqlx::query_as(
            "SELECT id, login, kind, admin, active, created_at FROM users ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(UserSummary::from).collect())
    }

    /// Check whether any admin account exists (used by --create-admin).
    pub async fn has_admin(&self) -> Result<bool, sqlx::Error> {
        let count: (i32,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE admin = 1 AND active = 1")
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0 > 0)
    }
}
