//! services/api/src/web/handlers/assignments.rs
//!
//! Tutor-student pairing endpoints.

use axum::{
    extract::State,
    response::IntoResponse,
    Extension,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tutoring_core::ports::AssignmentFilter;
use tutoring_core::{Assignment, AssignmentStatus, Principal};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiResult;
use crate::web::envelope::{created, ok, ok_with_message};
use crate::web::extract::{ApiJson, ApiPath, ApiQuery};
use crate::web::state::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AssignmentQuery {
    pub semester_id: Option<i64>,
    pub tutor_id: Option<i64>,
    pub student_id: Option<i64>,
    /// `active` or `inactive`
    #[param(value_type = Option<String>)]
    pub status: Option<AssignmentStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRequest {
    pub tutor_id: i64,
    pub student_id: i64,
    /// Defaults to the active semester.
    pub semester_id: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AutoAssignRequest {
    pub semester_id: i64,
    /// Restricts the pool; every active tutor takes part when omitted.
    pub tutor_ids: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReassignRequest {
    pub new_tutor_id: i64,
}

#[derive(Debug, Serialize)]
pub struct Reassignment {
    pub previous: Assignment,
    pub current: Assignment,
}

#[utoipa::path(get, path = "/assignments", tag = "assignments",
    params(AssignmentQuery),
    responses((status = 200, description = "Assignments visible to the caller")))]
pub async fn list_assignments(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiQuery(query): ApiQuery<AssignmentQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = AssignmentFilter {
        semester_id: query.semester_id,
        tutor_id: query.tutor_id,
        student_id: query.student_id,
        status: query.status,
    };
    Ok(ok(state.assignments.list(&principal, filter).await?))
}

#[utoipa::path(post, path = "/assignments", tag = "assignments",
    request_body = AssignRequest,
    responses(
        (status = 201, description = "Assignment created"),
        (status = 400, description = "Inactive tutor or student, or closed semester"),
        (status = 409, description = "Student already assigned this semester")
    ))]
pub async fn create_assignment(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiJson(req): ApiJson<AssignRequest>,
) -> ApiResult<impl IntoResponse> {
    let assignment = state
        .assignments
        .assign(&principal, req.tutor_id, req.student_id, req.semester_id)
        .await?;
    Ok(created(assignment))
}

/// Distribute every unassigned student of a semester over the tutor pool.
#[utoipa::path(post, path = "/assignments/auto", tag = "assignments",
    request_body = AutoAssignRequest,
    responses(
        (status = 201, description = "Assignments created, with the per-tutor load"),
        (status = 400, description = "No tutors or no unassigned students")
    ))]
pub async fn auto_assign(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiJson(req): ApiJson<AutoAssignRequest>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state
        .assignments
        .auto_assign(&principal, req.semester_id, req.tutor_ids)
        .await?;
    Ok(created(outcome))
}

#[utoipa::path(post, path = "/assignments/{id}/unassign", tag = "assignments",
    params(("id" = i64, Path, description = "Assignment id")),
    responses(
        (status = 200, description = "Assignment ended"),
        (status = 400, description = "Assignment already inactive")
    ))]
pub async fn unassign(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    let assignment = state.assignments.unassign(&principal, id).await?;
    Ok(ok_with_message(assignment, "Assignment ended"))
}

/// End an assignment and open a new one for another tutor.
#[utoipa::path(post, path = "/assignments/{id}/reassign", tag = "assignments",
    params(("id" = i64, Path, description = "Assignment id")),
    request_body = ReassignRequest,
    responses((status = 200, description = "Previous and current assignment")))]
pub async fn reassign(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ReassignRequest>,
) -> ApiResult<impl IntoResponse> {
    let (previous, current) = state
        .assignments
        .reassign(&principal, id, req.new_tutor_id)
        .await?;
    Ok(ok(Reassignment { previous, current }))
}
