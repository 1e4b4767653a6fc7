//! services/api/src/web/handlers/sessions.rs
//!
//! Session scheduling and the attendance-form lifecycle.

use axum::{
    extract::State,
    response::IntoResponse,
    Extension,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use std::sync::Arc;
use tutoring_core::ports::SessionFilter;
use tutoring_core::{Modality, NewSession, Principal, SessionForm, SessionStatus, SessionType};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiResult;
use crate::web::envelope::{created, ok};
use crate::web::extract::{ApiJson, ApiPath, ApiQuery};
use crate::web::state::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SessionQuery {
    pub tutor_id: Option<i64>,
    pub student_id: Option<i64>,
    pub semester_id: Option<i64>,
    #[param(value_type = Option<String>)]
    pub status: Option<SessionStatus>,
    #[param(value_type = Option<String>)]
    pub session_type: Option<SessionType>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    pub assignment_id: i64,
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "10:00:00")]
    pub end_time: NaiveTime,
    /// `academic`, `personal` or `professional`
    #[schema(value_type = String)]
    pub session_type: SessionType,
    /// `in_person` or `virtual`
    #[schema(value_type = String)]
    pub modality: Modality,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RescheduleRequest {
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    #[schema(value_type = String)]
    pub start_time: NaiveTime,
    #[schema(value_type = String)]
    pub end_time: NaiveTime,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelRequest {
    pub reason: String,
}

#[utoipa::path(get, path = "/sessions", tag = "sessions",
    params(SessionQuery),
    responses((status = 200, description = "Sessions visible to the caller")))]
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiQuery(query): ApiQuery<SessionQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = SessionFilter {
        tutor_id: query.tutor_id,
        student_id: query.student_id,
        semester_id: query.semester_id,
        status: query.status,
        session_type: query.session_type,
    };
    Ok(ok(state.sessions.list(&principal, filter).await?))
}

/// Schedule a session on one of the caller's active assignments.
#[utoipa::path(post, path = "/sessions", tag = "sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session scheduled"),
        (status = 400, description = "Invalid time range, past date or inactive assignment"),
        (status = 404, description = "No active semester"),
        (status = 409, description = "Overlaps another session of the tutor")
    ))]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiJson(req): ApiJson<CreateSessionRequest>,
) -> ApiResult<impl IntoResponse> {
    let new = NewSession {
        assignment_id: req.assignment_id,
        date: req.date,
        start_time: req.start_time,
        end_time: req.end_time,
        session_type: req.session_type,
        modality: req.modality,
        notes: req.notes,
    };
    Ok(created(state.sessions.create(&principal, new).await?))
}

#[utoipa::path(post, path = "/sessions/{id}/reschedule", tag = "sessions",
    params(("id" = i64, Path, description = "Session id")),
    request_body = RescheduleRequest,
    responses(
        (status = 200, description = "Session moved"),
        (status = 409, description = "New slot overlaps another session")
    ))]
pub async fn reschedule_session(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<RescheduleRequest>,
) -> ApiResult<impl IntoResponse> {
    let session = state
        .sessions
        .reschedule(&principal, id, req.date, req.start_time, req.end_time)
        .await?;
    Ok(ok(session))
}

/// Save a partially filled attendance form.
#[utoipa::path(post, path = "/sessions/{id}/draft", tag = "sessions",
    params(("id" = i64, Path, description = "Session id")),
    request_body(content_type = "application/json", description = "Form tagged by `type`"),
    responses((status = 200, description = "Draft saved, session in progress")))]
pub async fn save_draft(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(form): ApiJson<SessionForm>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.sessions.save_draft(&principal, id, form).await?))
}

#[utoipa::path(post, path = "/sessions/{id}/finalize", tag = "sessions",
    params(("id" = i64, Path, description = "Session id")),
    request_body(content_type = "application/json", description = "Completed form tagged by `type`"),
    responses(
        (status = 200, description = "Session completed"),
        (status = 400, description = "Required form fields missing")
    ))]
pub async fn finalize_session(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(form): ApiJson<SessionForm>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.sessions.finalize(&principal, id, form).await?))
}

#[utoipa::path(post, path = "/sessions/{id}/cancel", tag = "sessions",
    params(("id" = i64, Path, description = "Session id")),
    request_body = CancelRequest,
    responses(
        (status = 200, description = "Session cancelled"),
        (status = 400, description = "Blank reason or session already closed")
    ))]
pub async fn cancel_session(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<CancelRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.sessions.cancel(&principal, id, &req.reason).await?))
}
