//! services/api/src/web/handlers/semesters.rs
//!
//! Semester lifecycle endpoints, plus the per-semester views (unassigned
//! students and compliance) that hang off `/semesters/{id}`.

use axum::{
    extract::State,
    response::IntoResponse,
    Extension,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tutoring_core::{Principal, SemesterDraft, SemesterStatus};
use utoipa::ToSchema;

use crate::error::ApiResult;
use crate::web::envelope::{created, ok, ok_with_message};
use crate::web::extract::{ApiJson, ApiPath};
use crate::web::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SemesterRequest {
    pub name: String,
    #[schema(value_type = String, format = Date)]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = Date)]
    pub end_date: NaiveDate,
    /// `scheduled` (default), `active` or `closed`.
    #[schema(value_type = Option<String>)]
    pub status: Option<SemesterStatus>,
}

impl From<SemesterRequest> for SemesterDraft {
    fn from(req: SemesterRequest) -> Self {
        SemesterDraft {
            name: req.name,
            start_date: req.start_date,
            end_date: req.end_date,
            status: req.status.unwrap_or(SemesterStatus::Scheduled),
        }
    }
}

#[utoipa::path(get, path = "/semesters", tag = "semesters",
    responses((status = 200, description = "All semesters, newest first")))]
pub async fn list_semesters(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.semesters.list().await?))
}

#[utoipa::path(get, path = "/semesters/current", tag = "semesters",
    responses(
        (status = 200, description = "The active semester"),
        (status = 404, description = "No semester is active")
    ))]
pub async fn current_semester(
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.semesters.current().await?))
}

#[utoipa::path(get, path = "/semesters/{id}", tag = "semesters",
    params(("id" = i64, Path, description = "Semester id")),
    responses((status = 200, description = "The semester"), (status = 404, description = "Unknown id")))]
pub async fn get_semester(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.semesters.get(id).await?))
}

/// Create a semester. Creating it as `active` closes the current one.
#[utoipa::path(post, path = "/semesters", tag = "semesters",
    request_body = SemesterRequest,
    responses(
        (status = 201, description = "Semester created"),
        (status = 400, description = "Blank name or end date not after start date"),
        (status = 403, description = "Caller is not an administrator")
    ))]
pub async fn create_semester(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiJson(req): ApiJson<SemesterRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(created(state.semesters.create(&principal, req.into()).await?))
}

#[utoipa::path(put, path = "/semesters/{id}", tag = "semesters",
    params(("id" = i64, Path, description = "Semester id")),
    request_body = SemesterRequest,
    responses((status = 200, description = "Semester updated"), (status = 404, description = "Unknown id")))]
pub async fn update_semester(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<SemesterRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.semesters.update(&principal, id, req.into()).await?))
}

#[utoipa::path(post, path = "/semesters/{id}/activate", tag = "semesters",
    params(("id" = i64, Path, description = "Semester id")),
    responses((status = 200, description = "Semester is now the only active one")))]
pub async fn activate_semester(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    let semester = state.semesters.activate(&principal, id).await?;
    Ok(ok_with_message(semester, "Semester activated"))
}

#[utoipa::path(post, path = "/semesters/{id}/close", tag = "semesters",
    params(("id" = i64, Path, description = "Semester id")),
    responses(
        (status = 200, description = "Semester closed"),
        (status = 400, description = "Semester missing or already closed")
    ))]
pub async fn close_semester(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    let semester = state.semesters.close(&principal, id).await?;
    Ok(ok_with_message(semester, "Semester closed"))
}

#[utoipa::path(get, path = "/semesters/{id}/unassigned", tag = "assignments",
    params(("id" = i64, Path, description = "Semester id")),
    responses((status = 200, description = "Active students without an active assignment")))]
pub async fn unassigned_students(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.assignments.unassigned(&principal, id).await?))
}

#[utoipa::path(get, path = "/semesters/{id}/compliance", tag = "reports",
    params(("id" = i64, Path, description = "Semester id")),
    responses((status = 200, description = "Per-tutor completion and certificate counts")))]
pub async fn semester_compliance(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.reports.semester_compliance(&principal, id).await?))
}
