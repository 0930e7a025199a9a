use chrono::Utc;
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Params, Pbkdf2};
use rand_core::OsRng;
use sqlx::SqlitePool;

use crate::models::{Role, User};
use crate::Error;

/// Roughly the cost of bcrypt at cost 10 on current hardware.
pub const DEFAULT_HASH_ROUNDS: u32 = 600_000;

#[derive(Debug, Clone)]
pub struct CredentialStore {
    pool: SqlitePool,
    rounds: u32,
}

impl CredentialStore {
    pub fn new(pool: SqlitePool, rounds: u32) -> Self {
        Self { pool, rounds }
    }

    fn hash(&self, password: &str) -> Result<String, Error> {
        let salt = SaltString::generate(&mut OsRng);
        let params = Params {
            rounds: self.rounds,
            ..Params::default()
        };
        Ok(Pbkdf2
            .hash_password_customized(password.as_bytes(), None, None, params, salt.as_salt())?
            .to_string())
    }

    pub async fn find_by_username(&self, username: &str) -> Result<User, Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ? LIMIT 1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found(format!("User `{}` does not exist!", username)))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<User, Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ? LIMIT 1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found(format!("User with id `{}` does not exist!", id)))
    }

    pub async fn create(&self, username: &str, password: &str, role: Role) -> Result<User, Error> {
        if username.is_empty() || password.is_empty() {
            return Err(Error::validation("Username and password are required"));
        }

        let existing = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ? LIMIT 1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(username_taken(username));
        }

        let password_hash = self.hash(password)?;
        let created_at = Utc::now();
        let res = sqlx::query(
            "INSERT INTO users (username, password, role, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(&password_hash)
        .bind(role)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| match &err {
            // lost a race with a concurrent create
            sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed") => {
                username_taken(username)
            }
            _ => Error::from(err),
        })?;

        Ok(User {
            id: res.last_insert_rowid(),
            username: username.to_string(),
            password_hash,
            role,
            student_db_path: None,
            created_at,
        })
    }

    pub fn verify_password(&self, user: &User, candidate: &str) -> bool {
        match PasswordHash::new(&user.password_hash) {
            Ok(hash) => Pbkdf2.verify_password(candidate.as_bytes(), &hash).is_ok(),
            Err(err) => {
                log::warn!("Stored hash for user {} is unreadable: {}", user.id, err);
                false
            }
        }
    }

    /// Login check. Unknown usernames and wrong passwords fail identically.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, Error> {
        let user = match self.find_by_username(username).await {
            Ok(user) => user,
            Err(Error::NotFound { .. }) => return Err(Error::invalid_credentials()),
            Err(err) => return Err(err),
        };
        if !self.verify_password(&user, password) {
            return Err(Error::invalid_credentials());
        }
        Ok(user)
    }

    pub async fn update_password(&self, user_id: i64, password: &str) -> Result<(), Error> {
        if password.is_empty() {
            return Err(Error::validation("Password must not be empty"));
        }
        let password_hash = self.hash(password)?;
        let res = sqlx::query("UPDATE users SET password = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() < 1 {
            return Err(Error::not_found(format!(
                "User with id `{}` does not exist!",
                user_id
            )));
        }
        Ok(())
    }

    pub async fn attach_dataset(&self, user_id: i64, path: &str) -> Result<(), Error> {
        let res = sqlx::query("UPDATE users SET student_db_path = ? WHERE id = ?")
            .bind(path)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() < 1 {
            return Err(Error::not_found(format!(
                "User with id `{}` does not exist!",
                user_id
            )));
        }
        Ok(())
    }

    pub async fn with_role(&self, role: Role) -> Result<Vec<User>, Error> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE role = ? ORDER BY id")
                .bind(role)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    pub async fn teachers(&self) -> Result<Vec<User>, Error> {
        self.with_role(Role::Teacher).await
    }
}

fn username_taken(username: &str) -> Error {
    Error::Conflict {
        message: format!("Username `{}` already exists", username),
    }
}
