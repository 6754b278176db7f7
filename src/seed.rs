//! XML seed import with an exclusion list.
//!
//! Seed documents look like:
//!
//! ```xml
//! <data>
//!   <record id="partner_jane" model="partner">
//!     <field name="name">Jane Doe</field>
//!     <field name="email">jane@acme.test</field>
//!   </record>
//!   <record id="user_admin" model="user">
//!     <field name="login">admin@acme.test</field>
//!     <field name="admin">true</field>
//!   </record>
//! </data>
//! ```
//!
//! Records whose `id` is in the blocked set are filtered out before dispatch;
//! the rest are applied to the database. A record that fails (duplicate
//! login, unknown model) is reported without aborting the remainder.

use std::collections::HashSet;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::db::{CreateUserInput, Database, UserKind};

/// One `<record>` element: an id, a model name, and field/value pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedRecord {
    pub id: String,
    pub model: String,
    pub fields: Vec<(String, String)>,
}

impl SeedRecord {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug)]
pub enum SeedError {
    /// Malformed XML, or a structural problem like a record without an id.
    Parse(String),
}

impl std::fmt::Display for SeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedError::Parse(msg) => write!(f, "Failed to parse seed document: {}", msg),
        }
    }
}

impl std::error::Error for SeedError {}

impl From<quick_xml::Error> for SeedError {
    fn from(e: quick_xml::Error) -> Self {
        SeedError::Parse(e.to_string())
    }
}

/// Outcome counts of an [`apply_seed`] run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Parse a seed document into records. Only `<record>` children of the
/// `<data>` root are recognized.
pub fn parse_seed(xml: &str) -> Result<Vec<SeedRecord>, SeedError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut current: Option<SeedRecord> = None;
    let mut current_field: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"data" => {}
                b"record" => {
                    let mut id = None;
                    let mut model = None;
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| SeedError::Parse(e.to_string()))?;
                        let value = attr
                            .unescape_value()
                            .map_err(|e| SeedError::Parse(e.to_string()))?
                            .into_owned();
                        match attr.key.as_ref() {
                            b"id" => id = Some(value),
                            b"model" => model = Some(value),
                            _ => {}
                        }
                    }
                    let id = id.ok_or_else(|| {
                        SeedError::Parse("record element without an id attribute".into())
                    })?;
                    let model = model.ok_or_else(|| {
                        SeedError::Parse(format!("record {} has no model attribute", id))
                    })?;
                    current = Some(SeedRecord {
                        id,
                        model,
                        fields: Vec::new(),
                    });
                }
                b"field" => {
                    if current.is_none() {
                        return Err(SeedError::Parse("field element outside a record".into()));
                    }
                    let mut name = None;
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| SeedError::Parse(e.to_string()))?;
                        if attr.key.as_ref() == b"name" {
                            name = Some(
                                attr.unescape_value()
                                    .map_err(|e| SeedError::Parse(e.to_string()))?
                                    .into_owned(),
                            );
                        }
                    }
                    current_field = Some(name.ok_or_else(|| {
                        SeedError::Parse("field element without a name attribute".into())
                    })?);
                }
                other => {
                    return Err(SeedError::Parse(format!(
                        "unexpected element: {}",
                        String::from_utf8_lossy(other)
                    )));
                }
            },
            Event::Text(t) => {
                if let (Some(record), Some(field)) = (current.as_mut(), current_field.as_ref()) {
                    let text = t
                        .unescape()
                        .map_err(|e| SeedError::Parse(e.to_string()))?
                        .into_owned();
                    record.fields.push((field.clone(), text));
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"record" => {
                    if let Some(record) = current.take() {
                        records.push(record);
                    }
                }
                b"field" => {
                    // An empty <field name=.../> still records an empty value.
                    if let (Some(record), Some(field)) = (current.as_mut(), current_field.take()) {
                        if !record.fields.iter().any(|(n, _)| *n == field) {
                            record.fields.push((field, String::new()));
                        }
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                // Self-closing field: empty value.
                b"field" => {
                    if let Some(record) = current.as_mut() {
                        for attr in e.attributes() {
                            let attr = attr.map_err(|e| SeedError::Parse(e.to_string()))?;
                            if attr.key.as_ref() == b"name" {
                                let name = attr
                                    .unescape_value()
                                    .map_err(|e| SeedError::Parse(e.to_string()))?
                                    .into_owned();
                                record.fields.push((name, String::new()));
                            }
                        }
                    }
                }
                // Self-closing record: no fields, but id/model still required.
                b"record" => {
                    let mut id = None;
                    let mut model = None;
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| SeedError::Parse(e.to_string()))?;
                        let value = attr
                            .unescape_value()
                            .map_err(|e| SeedError::Parse(e.to_string()))?
                            .into_owned();
                        match attr.key.as_ref() {
                            b"id" => id = Some(value),
                            b"model" => model = Some(value),
                            _ => {}
                        }
                    }
                    let id = id.ok_or_else(|| {
                        SeedError::Parse("record element without an id attribute".into())
                    })?;
                    let model = model.ok_or_else(|| {
                        SeedError::Parse(format!("record {} has no model attribute", id))
                    })?;
                    records.push(SeedRecord {
                        id,
                        model,
                        fields: Vec::new(),
                    });
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(records)
}

/// Apply parsed seed records, filtering the blocked set first.
pub async fn apply_seed(
    db: &Database,
    records: &[SeedRecord],
    blocked_ids: &HashSet<String>,
) -> Result<SeedSummary, sqlx::Error> {
    let mut summary = SeedSummary::default();

    for record in records {
        if blocked_ids.contains(&record.id) {
            tracing::info!(id = %record.id, "Skipping seed import of record");
            summary.skipped += 1;
            continue;
        }

        match apply_record(db, record).await {
            Ok(()) => summary.applied += 1,
            Err(ApplyError::Rejected(reason)) => {
                tracing::warn!(id = %record.id, reason = %reason, "Seed record not applied");
                summary.failed += 1;
            }
            Err(ApplyError::Db(e)) => return Err(e),
        }
    }

    Ok(summary)
}

enum ApplyError {
    /// Record-level problem; the rest of the run continues.
    Rejected(String),
    Db(sqlx::Error),
}

async fn apply_record(db: &Database, record: &SeedRecord) -> Result<(), ApplyError> {
    match record.model.as_str() {
        "partner" => {
            let name = record
                .field("name")
                .ok_or_else(|| ApplyError::Rejected("partner without a name field".into()))?;
            let email = record.field("email").filter(|e| !e.is_empty());
            if let Some(email) = email {
                let existing = db
                    .partners()
                    .get_by_email(email)
                    .await
                    .map_err(ApplyError::Db)?;
                if existing.is_some() {
                    return Err(ApplyError::Rejected(format!(
                        "partner with email {} already exists",
                        email
                    )));
                }
            }
            db.partners()
                .create(name, email, None)
                .await
                .map_err(ApplyError::Db)?;
            Ok(())
        }
        "user" => {
            let login = record
                .field("login")
                .ok_or_else(|| ApplyError::Rejected("user without a login field".into()))?;
            let existing = db
                .users()
                .get_by_login_any(login)
                .await
                .map_err(ApplyError::Db)?;
            if existing.is_some() {
                return Err(ApplyError::Rejected(format!(
                    "user with login {} already exists",
                    login
                )));
            }
            let kind = record
                .field("kind")
                .map(UserKind::from_str)
                .unwrap_or(UserKind::Internal);
            let user_id = db
                .users()
                .create(CreateUserInput {
                    login,
                    kind,
                    partner_id: None,
                })
                .await
                .map_err(ApplyError::Db)?;
            if record.field("admin") == Some("true") {
                sqlx::query("UPDATE users SET admin = 1 WHERE id = ?")
                    .bind(user_id)
                    .execute(db.pool())
                    .await
                    .map_err(ApplyError::Db)?;
            }
            Ok(())
        }
        other => Err(ApplyError::Rejected(format!("unknown model: {}", other))),
    }
}
