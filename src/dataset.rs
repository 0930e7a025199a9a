use axum::extract::Multipart;
use axum::Extension;
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::io::{dataset_path, ensure_sqlite, read_upload, write_io_file};
use crate::models::Identity;
use crate::{proceeds, AppState, Payload};

/// Stores a student dataset (a SQLite file) for the caller and links it to their account.
pub async fn upload_dataset(
    identity: Identity,
    Extension(state): Extension<AppState>,
    mut multipart: Multipart,
) -> Payload<DatasetUploaded> {
    let upload = read_upload(&mut multipart, "database").await?;
    ensure_sqlite(&upload)?;
    // identities from the provider may have no local row to attach to
    state.credentials.find_by_id(identity.id).await?;

    let path = dataset_path(
        &state.data_dir,
        identity.id,
        Utc::now().timestamp_millis(),
    );
    write_io_file(&path, &upload.bytes).await?;

    let stored = path.to_string_lossy().into_owned();
    if let Err(err) = state.credentials.attach_dataset(identity.id, &stored).await {
        if let Err(io) = tokio::fs::remove_file(&path).await {
            log::warn!("Could not remove unlinked dataset {}: {}", stored, io);
        }
        return Err(err);
    }
    let path = stored;

    let mut hasher: Sha256 = Digest::new();
    hasher.update(&upload.bytes);
    let sha256 = hex::encode(hasher.finalize());
    log::info!(
        "User `{}` imported dataset {} ({} bytes)",
        identity.username,
        path,
        upload.bytes.len()
    );

    proceeds(DatasetUploaded {
        message: "Database uploaded successfully".to_string(),
        path,
        sha256,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetUploaded {
    pub message: String,
    pub path: String,
    pub sha256: String,
}
