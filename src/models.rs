use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            other => Err(format!("unknown role `{}`", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    #[sqlx(rename = "password")]
    pub password_hash: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_db_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
        }
    }
}

/// The authenticated `{id, username, role}` triple carried by a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: String,
    pub student_name: String,
    pub major: Option<String>,
    pub stage: Option<String>,
    pub study: Option<String>,
    pub study_group: Option<String>,
    pub teacher_id: i64,
    pub timestamp: DateTime<Utc>,
}

/// Client-supplied part of an attendance record. Ownership never comes from here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckIn {
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub student_name: String,
    pub major: Option<String>,
    pub stage: Option<String>,
    pub study: Option<String>,
    pub study_group: Option<String>,
}

impl CheckIn {
    pub fn new<S: Into<String>, N: Into<String>>(student_id: S, student_name: N) -> Self {
        Self {
            student_id: student_id.into(),
            student_name: student_name.into(),
            ..Default::default()
        }
    }
}
