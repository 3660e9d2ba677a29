use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode, Uri},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::middleware::access::{authorize, query_param};
use crate::models::attendance::{dedupe_marks, parse_date, AttendanceRow, AttendanceSummary};
use crate::models::pass::mask_token;
use crate::models::student::NewStudent;
use crate::store::{Page, ResourceStore};
use crate::AppState;

// ── Request DTOs ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateStudentRequest {
    pub name: Option<String>,
    pub usn: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceMark {
    pub student_id: i64,
    #[serde(default)]
    pub present: bool,
}

#[derive(Debug, Deserialize)]
pub struct SaveAttendanceRequest {
    pub date: Option<String>,
    pub rows: Option<Vec<AttendanceMark>>,
}

// ── Helpers ──────────────────────────────────────────────────

/// Unwrap a JSON body only after the gate has passed, so a bad body on an
/// unauthorized request still reports the auth failure.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(v)| v)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

fn page_from(uri: &Uri) -> Result<Page, AppError> {
    let parse = |name: &str| -> Result<Option<i64>, AppError> {
        match query_param(uri, name) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|n| *n >= 0)
                .map(Some)
                .ok_or_else(|| AppError::bad_request(format!("{} must be a non-negative integer", name))),
        }
    };
    Ok(Page {
        limit: parse("limit")?,
        offset: parse("offset")?.unwrap_or(0),
    })
}

fn required_date(raw: Option<String>, missing: &str) -> Result<chrono::NaiveDate, AppError> {
    let raw = raw
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| AppError::bad_request(missing))?;
    parse_date(&raw).ok_or_else(|| AppError::bad_request("date must be YYYY-MM-DD"))
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /students — roster ordered by name
#[tracing::instrument(skip_all)]
pub async fn list_students(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<Value>, AppError> {
    authorize(state.store.as_ref(), &headers, &uri, &["students:read"]).await?;

    let page = page_from(&uri)?;
    let students = state.store.list_students(page).await?;

    Ok(Json(json!({ "students": students })))
}

/// POST /students — add one student
#[tracing::instrument(skip_all)]
pub async fn create_student(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    body: Result<Json<CreateStudentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let pass = authorize(state.store.as_ref(), &headers, &uri, &["students:write"]).await?;

    let payload = json_body(body)?;
    let new_student = NewStudent::parse(payload.name.as_deref(), payload.usn.as_deref())
        .map_err(|e| AppError::bad_request(e.to_string()))?;

    let student = state.store.insert_student(&new_student).await?;
    tracing::info!(
        pass = %mask_token(&pass.token),
        student_id = student.id,
        usn = %student.usn,
        "student added"
    );

    Ok((StatusCode::CREATED, Json(json!({ "student": student }))))
}

/// GET /attendance?date=YYYY-MM-DD
#[tracing::instrument(skip_all)]
pub async fn get_attendance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<Value>, AppError> {
    authorize(state.store.as_ref(), &headers, &uri, &["attendance:read"]).await?;

    let date = required_date(query_param(&uri, "date"), "date is required")?;
    let attendance = state.store.attendance_for_date(date).await?;

    Ok(Json(json!({ "attendance": attendance })))
}

/// POST /attendance — idempotent upsert keyed by (student_id, date)
#[tracing::instrument(skip_all)]
pub async fn save_attendance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    body: Result<Json<SaveAttendanceRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let pass = authorize(state.store.as_ref(), &headers, &uri, &["attendance:write"]).await?;

    let payload = json_body(body)?;
    let rows = payload.rows.unwrap_or_default();
    if rows.is_empty() {
        return Err(AppError::bad_request("date and rows are required"));
    }
    let date = required_date(payload.date, "date and rows are required")?;

    let marks: Vec<AttendanceRow> = rows
        .iter()
        .map(|r| AttendanceRow {
            student_id: r.student_id,
            present: r.present,
        })
        .collect();
    let marks = dedupe_marks(&marks);

    let written = state.store.upsert_attendance(date, &marks).await?;
    tracing::info!(
        pass = %mask_token(&pass.token),
        %date,
        rows = written,
        "attendance saved"
    );

    Ok(Json(json!({ "ok": true })))
}

/// GET /attendance/summary?date=YYYY-MM-DD — present/absent split for a day
#[tracing::instrument(skip_all)]
pub async fn attendance_summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<AttendanceSummary>, AppError> {
    authorize(
        state.store.as_ref(),
        &headers,
        &uri,
        &["attendance:read", "students:read"],
    )
    .await?;

    let date = required_date(query_param(&uri, "date"), "date is required")?;
    let students = state.store.list_students(Page::default()).await?;
    let rows = state.store.attendance_for_date(date).await?;

    Ok(Json(AttendanceSummary::build(date, students, &rows)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn test_page_from_query() {
        assert_eq!(page_from(&uri("/students")).unwrap(), Page::default());
        assert_eq!(
            page_from(&uri("/students?limit=10&offset=20")).unwrap(),
            Page { limit: Some(10), offset: 20 }
        );
        assert!(page_from(&uri("/students?limit=-1")).is_err());
        assert!(page_from(&uri("/students?offset=abc")).is_err());
    }

    #[test]
    fn test_required_date() {
        assert!(matches!(
            required_date(None, "date is required"),
            Err(AppError::BadRequest(msg)) if msg == "date is required"
        ));
        assert!(matches!(
            required_date(Some("  ".into()), "date is required"),
            Err(AppError::BadRequest(msg)) if msg == "date is required"
        ));
        assert!(matches!(
            required_date(Some("2024-13-01".into()), "date is required"),
            Err(AppError::BadRequest(msg)) if msg == "date must be YYYY-MM-DD"
        ));
        assert!(required_date(Some("2024-01-01".into()), "date is required").is_ok());
    }
}
