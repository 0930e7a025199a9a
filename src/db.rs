use std::str::FromStr;
use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::credentials::CredentialStore;
use crate::models::{Role, User};
use crate::Error;

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT UNIQUE NOT NULL,
        password TEXT NOT NULL,
        role TEXT NOT NULL,
        student_db_path TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS attendance (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id TEXT NOT NULL,
        student_name TEXT NOT NULL,
        major TEXT,
        stage TEXT,
        study TEXT,
        study_group TEXT,
        teacher_id INTEGER NOT NULL,
        timestamp TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS attendance_by_teacher ON attendance (teacher_id, timestamp)",
];

pub async fn connect(url: &str) -> Result<SqlitePool, Error> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Private in-memory database. Pinned to one connection that never expires,
/// since every new SQLite connection would otherwise see an empty database.
pub async fn memory() -> Result<SqlitePool, Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None::<Duration>)
        .max_lifetime(None::<Duration>)
        .connect_with(options)
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bootstrap {
    Created { generated_password: Option<String> },
    PasswordReset,
    Existing,
}

/// Makes sure an admin account exists.
///
/// An existing admin is never deleted or recreated, so password changes made
/// to it survive restarts. With `reset` set, the configured admin's password is
/// overwritten with `password`.
pub async fn bootstrap_admin(
    credentials: &CredentialStore,
    username: &str,
    password: Option<&str>,
    reset: bool,
) -> Result<(User, Bootstrap), Error> {
    match credentials.find_by_username(username).await {
        Ok(user) if user.role != Role::Admin => Err(Error::Conflict {
            message: format!("`{}` exists but is not an admin account", username),
        }),
        Ok(user) if reset => {
            let password = password.ok_or_else(|| {
                Error::validation("Resetting the admin account requires an admin password")
            })?;
            credentials.update_password(user.id, password).await?;
            log::warn!("Password of admin account `{}` was reset", username);
            Ok((user, Bootstrap::PasswordReset))
        }
        Ok(user) => Ok((user, Bootstrap::Existing)),
        Err(Error::NotFound { .. }) => {
            let (password, generated) = match password {
                Some(password) => (password.to_string(), None),
                None => {
                    let generated: String = thread_rng()
                        .sample_iter(&Alphanumeric)
                        .take(20)
                        .map(char::from)
                        .collect();
                    (generated.clone(), Some(generated))
                }
            };
            let user = credentials.create(username, &password, Role::Admin).await?;
            log::info!("Default admin account `{}` created", username);
            Ok((
                user,
                Bootstrap::Created {
                    generated_password: generated,
                },
            ))
        }
        Err(err) => Err(err),
    }
}
