use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct PartnerStore {
    pool: SqlitePool,
}

/// A partner (contact) record. Portal access is granted per partner, keyed on
/// its email address.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Partner {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub parent_id: Option<i64>,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct PartnerRow {
    id: i64,
    name: String,
    email: Option<String>,
    parent_id: Option<i64>,
    created_at: String,
}

impl From<PartnerRow> for Partner {
    fn from(row: PartnerRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            parent_id: row.parent_id,
            created_at: row.created_at,
        }
    }
}

impl PartnerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a partner. Returns the partner ID.
    pub async fn create(
        &self,
        name: &str,
        email: Option<&str>,
        parent_id: Option<i64>,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO partners (name, email, parent_id) VALUES (?, ?, ?)")
            .bind(name)
            .bind(email)
            .bind(parent_id)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a partner by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Partner>, sqlx::Error> {
        let row: Option<PartnerRow> = sqlx::query_as(
            "SELECT id, name, email, parent_id, created_at FROM partners WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Partner::from))
    }

    /// Get a partner by email address.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<Partner>, sqlx::Error> {
        let row: Option<PartnerRow> = sqlx::query_as(
            "SELECT id, name, email, parent_id, created_at FROM partners WHERE email = ? LIMIT 1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Partner::from))
    }
}
