//! services/api/src/web/handlers/audit.rs
//!
//! Read side of the audit trail.

use axum::{
    extract::State,
    response::IntoResponse,
    Extension,
};
use serde::Deserialize;
use std::sync::Arc;
use tutoring_core::{AuditQuery, Principal};
use utoipa::IntoParams;

use crate::error::ApiResult;
use crate::web::envelope::ok;
use crate::web::extract::ApiQuery;
use crate::web::state::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditLogQuery {
    pub actor_id: Option<i64>,
    pub action: Option<String>,
    /// 1-based, defaults to 1
    pub page: Option<u32>,
    /// Defaults to 20, capped at 100
    pub per_page: Option<u32>,
}

/// Read the audit log, newest entries first.
#[utoipa::path(get, path = "/audit-log", tag = "audit",
    params(AuditLogQuery),
    responses(
        (status = 200, description = "One page of audit entries"),
        (status = 403, description = "Caller is not an administrator")
    ))]
pub async fn audit_log(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiQuery(query): ApiQuery<AuditLogQuery>,
) -> ApiResult<impl IntoResponse> {
    let query = AuditQuery {
        actor_id: query.actor_id,
        action: query.action,
        page: query.page,
        per_page: query.per_page,
    };
    Ok(ok(state.audit.query(&principal, query).await?))
}
