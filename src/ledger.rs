use chrono::{DateTime, SubsecRound, Utc};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::models::{AttendanceRecord, CheckIn};
use crate::policy::EffectiveScope;
use crate::Error;

/// Optional narrowing applied on top of a scope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendanceFilter {
    pub student_id: Option<String>,
    /// Inclusive lower bound on `timestamp`.
    pub since: Option<DateTime<Utc>>,
}

/// Append/query/delete store for attendance rows. There is no update.
#[derive(Debug, Clone)]
pub struct AttendanceLedger {
    pool: SqlitePool,
}

impl AttendanceLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, teacher_id: i64, entry: CheckIn) -> Result<AttendanceRecord, Error> {
        let student_id = entry.student_id.trim();
        let student_name = entry.student_name.trim();
        if student_id.is_empty() || student_name.is_empty() {
            return Err(Error::validation("Student ID and name are required"));
        }

        let timestamp = Utc::now().trunc_subsecs(6);
        let res = sqlx::query(
            "INSERT INTO attendance \
             (student_id, student_name, major, stage, study, study_group, teacher_id, timestamp) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(student_id)
        .bind(student_name)
        .bind(&entry.major)
        .bind(&entry.stage)
        .bind(&entry.study)
        .bind(&entry.study_group)
        .bind(teacher_id)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;

        Ok(AttendanceRecord {
            id: res.last_insert_rowid(),
            student_id: student_id.to_string(),
            student_name: student_name.to_string(),
            major: entry.major,
            stage: entry.stage,
            study: entry.study,
            study_group: entry.study_group,
            teacher_id,
            timestamp,
        })
    }

    /// Records visible under `scope`, newest first.
    pub async fn query(
        &self,
        scope: EffectiveScope,
        filter: &AttendanceFilter,
    ) -> Result<Vec<AttendanceRecord>, Error> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM attendance");
        let mut conjunction = " WHERE ";
        if let Some(owner) = scope.owner() {
            query.push(conjunction).push("teacher_id = ").push_bind(owner);
            conjunction = " AND ";
        }
        if let Some(student_id) = &filter.student_id {
            query
                .push(conjunction)
                .push("student_id = ")
                .push_bind(student_id.clone());
            conjunction = " AND ";
        }
        if let Some(since) = filter.since {
            query.push(conjunction).push("timestamp >= ").push_bind(since);
        }
        query.push(" ORDER BY timestamp DESC, id DESC");

        Ok(query
            .build_query_as::<AttendanceRecord>()
            .fetch_all(&self.pool)
            .await?)
    }

    /// Deletes every record under `scope` and returns how many went.
    pub async fn delete(&self, scope: EffectiveScope) -> Result<u64, Error> {
        let res = match scope.owner() {
            Some(owner) => {
                sqlx::query("DELETE FROM attendance WHERE teacher_id = ?")
                    .bind(owner)
                    .execute(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("DELETE FROM attendance")
                    .execute(&self.pool)
                    .await?
            }
        };
        Ok(res.rows_affected())
    }

    /// Deletes record `id` if it lies inside `scope`.
    pub async fn delete_one(&self, scope: EffectiveScope, id: i64) -> Result<bool, Error> {
        let res = match scope.owner() {
            Some(owner) => {
                sqlx::query("DELETE FROM attendance WHERE id = ? AND teacher_id = ?")
                    .bind(id)
                    .bind(owner)
                    .execute(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("DELETE FROM attendance WHERE id = ?")
                    .bind(id)
                    .execute(&self.pool)
                    .await?
            }
        };
        Ok(res.rows_affected() > 0)
    }
}
