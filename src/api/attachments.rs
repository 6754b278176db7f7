//! Attachment upload and download.
//!
//! Bytes go to the filestore, metadata to the attachments table. Downloads
//! honor the store's soft-missing fallback: a vanished file is served as an
//! empty 200 rather than an error when the store is configured that way.

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;

use super::error::{ApiError, ResultExt};
use crate::auth::Auth;
use crate::db::{CreateAttachmentInput, Database};
use crate::impl_has_auth_state;
use crate::storage::{FileContent, FileStore};

#[derive(Clone)]
pub struct AttachmentsState {
    pub db: Database,
    pub files: FileStore,
    pub secure_cookies: bool,
}

impl_has_auth_state!(AttachmentsState);

pub fn router(state: AttachmentsState) -> Router {
    Router::new()
        .route("/", post(upload))
        .route("/{id}", get(download))
        .with_state(state)
}

#[derive(Serialize)]
struct UploadResponse {
    id: i64,
    name: String,
    size: i64,
    checksum: String,
}

async fn upload(
    State(state): State<AttachmentsState>,
    Auth(_auth): Auth,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut partner_id: Option<i64> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let name = field
                    .file_name()
                    .unwrap_or("untitled")
                    .to_string();
                let mimetype = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;
                file = Some((name, mimetype, bytes.to_vec()));
            }
            Some("partner_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid partner_id: {}", e)))?;
                partner_id = Some(
                    text.parse()
                        .map_err(|_| ApiError::bad_request("partner_id must be an integer"))?,
                );
            }
            _ => {}
        }
    }

    let (name, mimetype, bytes) =
        file.ok_or_else(|| ApiError::bad_request("Missing file field"))?;

    if let Some(partner_id) = partner_id {
        state
            .db
            .partners()
            .get_by_id(partner_id)
            .await
            .db_err("Failed to load partner")?
            .ok_or_else(|| ApiError::not_found("Partner not found"))?;
    }

    let stored = state.files.write(&bytes).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to write to filestore");
        ApiError::internal("Failed to store file")
    })?;

    let id = state
        .db
        .attachments()
        .create(CreateAttachmentInput {
            name: &name,
            mimetype: &mimetype,
            store_fname: &stored.store_fname,
            size: stored.size,
            checksum: &stored.checksum,
            partner_id,
        })
        .await
        .db_err("Failed to create attachment")?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id,
            name,
            size: stored.size,
            checksum: stored.checksum,
        }),
    ))
}

async fn download(
    State(state): State<AttachmentsState>,
    Auth(_auth): Auth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let attachment = state
        .db
        .attachments()
        .get_by_id(id)
        .await
        .db_err("Failed to load attachment")?
        .ok_or_else(|| ApiError::not_found("Attachment not found"))?;

    match state.files.read(&attachment.store_fname).await {
        Ok(FileContent::Found(bytes)) => {
            Ok(([(header::CONTENT_TYPE, attachment.mimetype)], bytes).into_response())
        }
        // The empty-stream mirror: size 0, generic mimetype, still a 200.
        Ok(FileContent::Missing) => Ok((
            [(
                header::CONTENT_TYPE,
                "application/octet-stream".to_string(),
            )],
            Vec::new(),
        )
            .into_response()),
        Err(e) => {
            tracing::error!(error = %e, attachment = id, "Failed to read attachment");
            Err(ApiError::internal("Failed to read attachment"))
        }
    }
}
