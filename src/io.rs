use std::path::{Path, PathBuf};

use anyhow::bail;
use axum::extract::Multipart;
use tokio::fs::{create_dir_all, File};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::Error;

/// First bytes of every SQLite 3 database file.
pub const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

pub async fn prepare_io(data_dir: &Path) -> anyhow::Result<()> {
    create_dir_all(data_dir).await?;
    Ok(())
}

pub async fn create_io_file(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent).await?;
    }
    if path.exists() {
        bail!("File already exists!")
    }
    File::create(path).await.map_err(anyhow::Error::from)
}

pub async fn write_io_file(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let mut writer = BufWriter::new(create_io_file(path).await?);
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Pulls the named file field out of a multipart body, skipping other fields.
pub async fn read_upload(multipart: &mut Multipart, field_name: &str) -> Result<UploadedFile, Error> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(field_name) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        return Ok(UploadedFile {
            file_name,
            bytes: bytes.to_vec(),
        });
    }
    Err(Error::validation("No file uploaded"))
}

/// Accepts only `*.db` files that actually carry a SQLite header.
pub fn ensure_sqlite(upload: &UploadedFile) -> Result<(), Error> {
    if !upload.file_name.ends_with(".db") {
        return Err(Error::validation("Only SQLite database files are allowed"));
    }
    if !upload.bytes.starts_with(SQLITE_HEADER) {
        return Err(Error::validation(
            "Uploaded file is not a SQLite database",
        ));
    }
    Ok(())
}

pub fn dataset_path(data_dir: &Path, user_id: i64, millis: i64) -> PathBuf {
    data_dir.join(format!("students_{}_{}.db", user_id, millis))
}
