//! Attachment metadata storage.
//!
//! Only metadata lives in the database; the file bytes are written to the
//! filestore on disk under `store_fname` (see `crate::storage`).

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct AttachmentStore {
    pool: SqlitePool,
}

/// An attachment record.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Attachment {
    pub id: i64,
    pub name: String,
    pub mimetype: String,
    pub store_fname: String,
    pub size: i64,
    pub checksum: String,
    pub partner_id: Option<i64>,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct AttachmentRow {
    id: i64,
    name: String,
    mimetype: String,
    store_fname: String,
    size: i64,
    checksum: String,
    partner_id: Option<i64>,
    created_at: String,
}

impl From<AttachmentRow> for Attachment {
    fn from(row: AttachmentRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            mimetype: row.mimetype,
            store_fname: row.store_fname,
            size: row.size,
            checksum: row.checksum,
            partner_id: row.partner_id,
            created_at: row.created_at,
        }
    }
}

/// Fields for creating an attachment record after the bytes have been
/// written to the filestore.
pub struct CreateAttachmentInput<'a> {
    pub name: &'a str,
    pub mimetype: &'a str,
    pub store_fname: &'a str,
    pub size: i64,
    pub checksum: &'a str,
    pub partner_id: Option<i64>,
}

impl AttachmentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new attachment record. Returns the attachment ID.
    pub async fn create(&self, input: CreateAttachmentInput<'_>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO attachments (name, mimetype, store_fname, size, checksum, partner_id)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(input.name)
        .bind(input.mimetype)
        .bind(input.store_fname)
        .bind(input.size)
        .bind(input.checksum)
        .bind(input.partner_id)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get an attachment by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Attachment>, sqlx::Error> {
        let row: Option<AttachmentRow> = sqlx::query_as(
            "SELECT id, name, mimetype, store_fname, size, checksum, partner_id, created_at
             FROM attachments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Attachment::from))
    }

    /// List attachments linked to a partner.
    pub async fn list_for_partner(&self, partner_id: i64) -> Result<Vec<Attachment>, sqlx::Error> {
        let rows: Vec<AttachmentRow> = sqlx::query_as(
            "SELECT id, name, mimetype, store_fname, size, checksum, partner_id, created_at
             FROM attachments WHERE partner_id = ? ORDER BY id",
        )
        .bind(partner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Attachment::from).collect())
    }
}
