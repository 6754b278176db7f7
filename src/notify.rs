//! Chatter posting with recipient-notification filtering.
//!
//! Recipients are the followers of the partner record, minus the explicit
//! exclusion list and minus the author's own partner. The exclusion list is
//! a request parameter, not ambient context.

use crate::db::{Database, User};

/// Result of posting a message: its id and who was notified.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Posted {
    pub message_id: i64,
    pub notified_partner_ids: Vec<i64>,
}

/// Post a chatter message on a partner record and create one notification
/// row per surviving recipient.
pub async fn post_message(
    db: &Database,
    partner_id: i64,
    author: &User,
    body: &str,
    exclude_partner_ids: &[i64],
) -> Result<Posted, sqlx::Error> {
    let messages = db.messages();
    let message_id = messages.create(partner_id, author.id, body).await?;

    let followers = messages.list_followers(partner_id).await?;
    let mut notified = Vec::with_capacity(followers.len());
    for follower in followers {
        if exclude_partner_ids.contains(&follower) {
            continue;
        }
        if author.partner_id == Some(follower) {
            continue;
        }
        messages.create_notification(message_id, follower).await?;
        notified.push(follower);
    }

    Ok(Posted {
        message_id,
        notified_partner_ids: notified,
    })
}
