//! Partner chatter: messages, followers, and delivered notifications.

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct MessageStore {
    pool: SqlitePool,
}

/// A chatter message posted on a partner record.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Message {
    pub id: i64,
    pub partner_id: i64,
    pub author_id: i64,
    pub body: String,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    partner_id: i64,
    author_id: i64,
    body: String,
    created_at: String,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            partner_id: row.partner_id,
            author_id: row.author_id,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

impl MessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a chatter message. Returns the message ID.
    pub async fn create(
        &self,
        partner_id: i64,
        author_id: i64,
        body: &str,
    ) -> Result<i64, sqlx::Error> {
        let result =
            sqlx::query("INSERT INTO messages (partner_id, author_id, body) VALUES (?, ?, ?)")
                .bind(partner_id)
                .bind(author_id)
                .bind(body)
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    /// List messages posted on a partner record, oldest first.
    pub async fn list_for_partner(&self, partner_id: i64) -> Result<Vec<Message>, sqlx::Error> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, partner_id, author_id, body, created_at FROM messages WHERE partner_id = ? ORDER BY id",
        )
        .bind(partner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Message::from).collect())
    }

    /// Subscribe a partner to a record's chatter. Idempotent.
    pub async fn add_follower(
        &self,
        partner_id: i64,
        follower_partner_id: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT OR IGNORE INTO followers (partner_id, follower_partner_id) VALUES (?, ?)",
        )
        .bind(partner_id)
        .bind(follower_partner_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Partners subscribed to a record's chatter.
    pub async fn list_followers(&self, partner_id: i64) -> Result<Vec<i64>, sqlx::Error> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT follower_partner_id FROM followers WHERE partner_id = ? ORDER BY follower_partner_id",
        )
        .bind(partner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// Record a delivered notification for one recipient.
    pub async fn create_notification(
        &self,
        message_id: i64,
        recipient_partner_id: i64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO notifications (message_id, recipient_partner_id) VALUES (?, ?)",
        )
        .bind(message_id)
        .bind(recipient_partner_id)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Recipients a message was delivered to.
    pub async fn notified_partners(&self, message_id: i64) -> Result<Vec<i64>, sqlx::Error> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT recipient_partner_id FROM notifications WHERE message_id = ? ORDER BY recipient_partner_id",
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[tokio::test]
    async fn test_followers_are_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        let record = db.partners().create("Acme", None, None).await.unwrap();
        let follower = db
            .partners()
            .create("Watcher", Some("w@acme.test"), None)
            .await
            .unwrap();

        db.messages().add_follower(record, follower).await.unwrap();
        db.messages().add_follower(record, follower).await.unwrap();

        assert_eq!(db.messages().list_followers(record).await.unwrap(), vec![follower]);
    }

    #[tokio::test]
    async fn test_message_and_notification_roundtrip() {
        let db = Database::open(":memory:").await.unwrap();
        let partner = db.partners().create("Acme", None, None).await.unwrap();
        let author = db
            .users()
            .create(crate::db::CreateUserInput {
                login: "author@test",
                kind: crate::db::UserKind::Internal,
                partner_id: None,
            })
            .await
            .unwrap();

        let msg = db
            .messages()
            .create(partner, author, "hello")
            .await
            .unwrap();
        db.messages().create_notification(msg, partner).await.unwrap();

        let messages = db.messages().list_for_partner(partner).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body, "hello");
        assert_eq!(db.messages().notified_partners(msg).await.unwrap(), vec![partner]);
    }
}
