//! Remote store for uploaded database snapshots.
//!
//! The server-held credential stays inside the store; clients only ever see
//! [`ArtifactConfig`].

use std::sync::Arc;

use axum::async_trait;
use axum::extract::{Multipart, Path};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use axum::Extension;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::io::{ensure_sqlite, read_upload};
use crate::models::Identity;
use crate::{created, proceeds, AppState, Created, Error, Payload};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub path: String,
    pub size: u64,
}

/// Non-sensitive description of where snapshots live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactConfig {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    #[serde(rename = "dbFolder")]
    pub folder: String,
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    fn config(&self) -> ArtifactConfig;

    async fn create(&self, name: &str, content: &[u8]) -> Result<Artifact, Error>;

    async fn list(&self) -> Result<Vec<Artifact>, Error>;

    async fn fetch(&self, name: &str) -> Result<Vec<u8>, Error>;
}

/// `students.db` uploaded at 2025-03-01T08:30:00.123Z becomes
/// `students_2025-03-01T08-30-00-123Z.db`.
///
/// Characters outside `[A-Za-z0-9_-]` in the stem become `_`.
pub fn snapshot_name(original: &str, at: DateTime<Utc>) -> String {
    let stem: String = original
        .strip_suffix(".db")
        .unwrap_or(original)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = if stem.is_empty() { "database" } else { stem.as_str() };
    let stamp = at
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
        .replace([':', '.'], "-");
    format!("{}_{}.db", stem, stamp)
}

/// Rejects anything that could address outside the snapshot folder.
pub fn check_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(Error::validation(format!("Invalid artifact name `{}`", name)));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub folder: String,
}

/// Snapshot store backed by the GitHub contents API.
pub struct GitHubStore {
    client: reqwest::Client,
    config: GitHubConfig,
    api: String,
}

#[derive(Serialize)]
struct PutContent<'a> {
    message: String,
    content: String,
    branch: &'a str,
}

#[derive(Deserialize)]
struct ContentEntry {
    name: String,
    path: String,
    #[serde(default)]
    size: u64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct PutResponse {
    content: ContentEntry,
}

impl GitHubStore {
    pub fn new(config: GitHubConfig) -> Self {
        Self::with_api(config, "https://api.github.com")
    }

    pub fn with_api<S: Into<String>>(config: GitHubConfig, api: S) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            api: api.into(),
        }
    }

    /// Each segment is percent-encoded, so names may hold `#`, `?` or spaces.
    fn contents_url(&self, name: Option<&str>) -> Result<reqwest::Url, Error> {
        let mut url = reqwest::Url::parse(&self.api)
            .map_err(|err| Error::internal("ConfigError", err.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| {
                Error::internal("ConfigError", format!("`{}` cannot be a base URL", self.api))
            })?
            .pop_if_empty()
            .extend([
                "repos",
                self.config.owner.as_str(),
                self.config.repo.as_str(),
                "contents",
            ])
            .extend(self.config.folder.split('/').filter(|part| !part.is_empty()))
            .extend(name);
        Ok(url)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header(AUTHORIZATION, format!("token {}", self.config.token))
            .header(USER_AGENT, "attendance-server")
    }
}

async fn upstream_failure(response: reqwest::Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Error::upstream(format!("GitHub API error {}: {}", status, body))
}

#[async_trait]
impl ArtifactStore for GitHubStore {
    fn config(&self) -> ArtifactConfig {
        ArtifactConfig {
            owner: self.config.owner.clone(),
            repo: self.config.repo.clone(),
            branch: self.config.branch.clone(),
            folder: self.config.folder.clone(),
        }
    }

    async fn create(&self, name: &str, content: &[u8]) -> Result<Artifact, Error> {
        check_name(name)?;
        let body = PutContent {
            message: format!("Upload database file: {}", name),
            content: STANDARD.encode(content),
            branch: &self.config.branch,
        };
        let response = self
            .request(self.client.put(self.contents_url(Some(name))?))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(upstream_failure(response).await);
        }
        let created: PutResponse = response.json().await?;
        log::info!("Uploaded snapshot {} to {}", name, created.content.path);
        Ok(Artifact {
            name: created.content.name,
            path: created.content.path,
            size: content.len() as u64,
        })
    }

    async fn list(&self) -> Result<Vec<Artifact>, Error> {
        let response = self
            .request(self.client.get(self.contents_url(None)?))
            .query(&[("ref", self.config.branch.as_str())])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(upstream_failure(response).await);
        }
        let entries: Vec<ContentEntry> = response.json().await?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.kind == "file" && entry.name.ends_with(".db"))
            .map(|entry| Artifact {
                name: entry.name,
                path: entry.path,
                size: entry.size,
            })
            .collect())
    }

    async fn fetch(&self, name: &str) -> Result<Vec<u8>, Error> {
        check_name(name)?;
        let response = self
            .request(self.client.get(self.contents_url(Some(name))?))
            .header(ACCEPT, "application/vnd.github.raw")
            .query(&[("ref", self.config.branch.as_str())])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::not_found(format!("Artifact `{}` does not exist!", name)));
        }
        if !response.status().is_success() {
            return Err(upstream_failure(response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }
}

fn configured(state: &AppState) -> Result<Arc<dyn ArtifactStore>, Error> {
    state
        .artifacts
        .clone()
        .ok_or_else(|| Error::not_found("Remote artifact store is not configured"))
}

pub async fn artifact_config(Extension(state): Extension<AppState>) -> Payload<ArtifactConfig> {
    proceeds(configured(&state)?.config())
}

pub async fn list_artifacts(
    _identity: Identity,
    Extension(state): Extension<AppState>,
) -> Payload<ArtifactList> {
    proceeds(ArtifactList {
        artifacts: configured(&state)?.list().await?,
    })
}

pub async fn upload_artifact(
    identity: Identity,
    Extension(state): Extension<AppState>,
    mut multipart: Multipart,
) -> Created<Artifact> {
    let store = configured(&state)?;
    let upload = read_upload(&mut multipart, "database").await?;
    ensure_sqlite(&upload)?;

    let name = snapshot_name(&upload.file_name, Utc::now());
    let artifact = store.create(&name, &upload.bytes).await?;
    log::info!("User `{}` uploaded snapshot {}", identity.username, artifact.name);
    created(artifact)
}

pub async fn fetch_artifact(
    _identity: Identity,
    Extension(state): Extension<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, Error> {
    check_name(&name)?;
    let bytes = configured(&state)?.fetch(&name).await?;
    Ok((
        [
            (CONTENT_TYPE, "application/x-sqlite3".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", name),
            ),
        ],
        bytes,
    ))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactList {
    pub artifacts: Vec<Artifact>,
}
