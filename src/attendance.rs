use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::export::ExportFormat;
use crate::ledger::AttendanceFilter;
use crate::models::{AttendanceRecord, CheckIn, Identity};
use crate::policy::{authorize, Action, EffectiveScope};
use crate::{created, proceeds, AppState, Created, Error, Payload};

pub async fn record_attendance(
    identity: Identity,
    Extension(state): Extension<AppState>,
    body: Result<Json<CheckIn>, JsonRejection>,
) -> Created<AttendanceRecord> {
    let Json(check_in) = body?;
    let scope = authorize(&identity, Action::CreateAttendance, None)?;
    let owner = scope
        .owner()
        .ok_or_else(|| Error::internal("PolicyError", "check-in scope has no owner"))?;

    let record = state.ledger.insert(owner, check_in).await?;
    log::debug!(
        "Teacher {} recorded {} ({})",
        owner,
        record.student_id,
        record.id
    );
    created(record)
}

pub async fn list_attendance(
    identity: Identity,
    Extension(state): Extension<AppState>,
    query: Result<Query<AttendanceQuery>, QueryRejection>,
) -> Payload<AttendanceList> {
    let Query(query) = query?;
    let target = requested_teacher(&identity, query.teacher_id.as_deref())?;
    let scope = authorize(&identity, Action::ReadAttendance, target)?;
    let filter = AttendanceFilter {
        student_id: query.student_id,
        since: query.since,
    };

    proceeds(AttendanceList {
        records: state.ledger.query(scope, &filter).await?,
    })
}

pub async fn reset_attendance(
    identity: Identity,
    Extension(state): Extension<AppState>,
    query: Result<Query<ResetQuery>, QueryRejection>,
) -> Payload<ResetOutcome> {
    let Query(query) = query?;
    let target = requested_teacher(&identity, query.teacher_id.as_deref())?;
    let scope = authorize(&identity, Action::DeleteAttendance, target)?;
    if scope == EffectiveScope::All && !query.confirm.unwrap_or(false) {
        return Err(Error::validation(
            "Resetting every teacher's records requires `confirm=true`",
        ));
    }

    let count = state.ledger.delete(scope).await?;
    log::info!(
        "User `{}` reset attendance ({:?}): {} records removed",
        identity.username,
        scope,
        count
    );
    proceeds(ResetOutcome {
        message: "Attendance records reset successfully".to_string(),
        count,
    })
}

/// Removes one record. Records outside the caller's scope look missing.
pub async fn delete_attendance(
    identity: Identity,
    Extension(state): Extension<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Payload<Deleted> {
    let Path(id) = id?;
    let scope = authorize(&identity, Action::DeleteAttendance, None)?;
    if !state.ledger.delete_one(scope, id).await? {
        return Err(Error::not_found(format!(
            "Attendance record `{}` does not exist!",
            id
        )));
    }

    log::info!("User `{}` deleted attendance record {}", identity.username, id);
    proceeds(Deleted {
        message: "Attendance record deleted successfully".to_string(),
        id,
    })
}

pub async fn export_attendance(
    identity: Identity,
    Extension(state): Extension<AppState>,
    query: Result<Query<ExportQuery>, QueryRejection>,
) -> Result<impl IntoResponse, Error> {
    let Query(query) = query?;
    let format = ExportFormat::parse(query.format.as_deref())?;
    let target = requested_teacher(&identity, query.teacher_id.as_deref())?;
    let scope = authorize(&identity, Action::ReadAttendance, target)?;

    let records = state
        .ledger
        .query(scope, &AttendanceFilter::default())
        .await?;
    let bytes = format.render(&records)?;
    let file_name = format.file_name(Utc::now().timestamp_millis());

    Ok((
        [
            (CONTENT_TYPE, format.content_type().to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    ))
}

/// Target teacher named in a query string. Only admins may pick one, so for
/// anyone else the raw value is dropped without being parsed.
fn requested_teacher(identity: &Identity, raw: Option<&str>) -> Result<Option<i64>, Error> {
    if !identity.is_admin() {
        return Ok(None);
    }
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::validation(format!("Invalid teacher_id `{}`", raw))),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendanceQuery {
    pub teacher_id: Option<String>,
    pub student_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResetQuery {
    pub teacher_id: Option<String>,
    pub confirm: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
    pub teacher_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceList {
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetOutcome {
    pub message: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deleted {
    pub message: String,
    pub id: i64,
}
