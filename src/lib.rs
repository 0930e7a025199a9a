pub mod artifacts;
pub mod attendance;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod dataset;
pub mod db;
pub mod err;
pub mod export;
pub mod io;
pub mod ledger;
pub mod models;
pub mod policy;
pub mod token;

use std::path::PathBuf;
use std::sync::Arc;

use axum::handler::Handler;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use chrono::Duration;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::artifacts::{ArtifactStore, GitHubStore};
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::ledger::AttendanceLedger;
use crate::token::{TokenService, TrustedIssuer};

pub use crate::err::{Error, Success};

pub type Payload<T> = Result<Json<Success<T>>, Error>;
pub type Created<T> = Result<(StatusCode, Json<Success<T>>), Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Json(Success::of(value)))
}

pub fn created<V>(value: V) -> Created<V>
where
    V: Serialize,
{
    Ok((StatusCode::CREATED, Json(Success::of(value))))
}

/// Everything a request handler needs, passed in through an `Extension` layer.
#[derive(Clone)]
pub struct AppState {
    pub credentials: CredentialStore,
    pub tokens: TokenService,
    pub ledger: AttendanceLedger,
    pub artifacts: Option<Arc<dyn ArtifactStore>>,
    pub data_dir: PathBuf,
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(pool: SqlitePool, tokens: TokenService, hash_rounds: u32, data_dir: PathBuf) -> Self {
        Self {
            credentials: CredentialStore::new(pool.clone(), hash_rounds),
            tokens,
            ledger: AttendanceLedger::new(pool),
            artifacts: None,
            data_dir,
            secure_cookies: false,
        }
    }

    pub fn with_artifacts(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = Some(store);
        self
    }

    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        io::prepare_io(&config.data_dir).await?;
        let pool = db::connect(&config.database_url).await?;

        let secret = match &config.jwt_secret {
            Some(secret) => secret.clone(),
            None => {
                log::warn!("JWT_SECRET is not set, sessions will not survive a restart");
                TokenService::ephemeral_secret()
            }
        };
        let mut tokens = TokenService::new(&secret, Duration::hours(config.token_ttl_hours));
        if let (Some(issuer), Some(provider_secret)) =
            (&config.provider_issuer, &config.provider_secret)
        {
            log::info!("Accepting identity tokens issued by {}", issuer);
            tokens = tokens.with_trusted_issuer(TrustedIssuer::new(issuer, provider_secret));
        }

        let mut state = AppState::new(pool, tokens, config.hash_rounds, config.data_dir.clone())
            .with_secure_cookies(config.secure_cookies);
        if let Some(github) = config.github() {
            log::info!(
                "Snapshots go to {}/{}@{}",
                github.owner,
                github.repo,
                github.branch
            );
            state = state.with_artifacts(Arc::new(GitHubStore::new(github)));
        }
        Ok(state)
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/users", post(auth::create_teacher).get(auth::list_teachers))
        .route(
            "/attendance",
            post(attendance::record_attendance).get(attendance::list_attendance),
        )
        .route("/attendance/reset", delete(attendance::reset_attendance))
        .route("/attendance/:id", delete(attendance::delete_attendance))
        .route("/export", get(attendance::export_attendance))
        .route("/upload-db", post(dataset::upload_dataset))
        .route("/github-config", get(artifacts::artifact_config))
        .route(
            "/artifacts",
            get(artifacts::list_artifacts).post(artifacts::upload_artifact),
        )
        .route("/artifacts/:name", get(artifacts::fetch_artifact));

    Router::new()
        .nest("/api", api)
        .fallback(err::handler404.into_service())
        .layer(Extension(state))
}
