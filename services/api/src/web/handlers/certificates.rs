//! services/api/src/web/handlers/certificates.rs

use axum::{
    extract::State,
    response::IntoResponse,
    Extension,
};
use serde::Deserialize;
use std::sync::Arc;
use tutoring_core::ports::CertificateFilter;
use tutoring_core::Principal;
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiResult;
use crate::web::envelope::{created, ok, ok_with_message};
use crate::web::extract::{ApiJson, ApiPath, ApiQuery};
use crate::web::state::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CertificateQuery {
    pub semester_id: Option<i64>,
    pub student_id: Option<i64>,
    pub tutor_id: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateCertificateRequest {
    pub student_id: i64,
    pub semester_id: i64,
}

#[utoipa::path(get, path = "/certificates", tag = "certificates",
    params(CertificateQuery),
    responses((status = 200, description = "Certificates visible to the caller")))]
pub async fn list_certificates(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiQuery(query): ApiQuery<CertificateQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = CertificateFilter {
        semester_id: query.semester_id,
        student_id: query.student_id,
        tutor_id: query.tutor_id,
    };
    Ok(ok(state.certificates.list(&principal, filter).await?))
}

/// Generate (or regenerate) a student's certificate for a semester.
#[utoipa::path(post, path = "/certificates", tag = "certificates",
    request_body = GenerateCertificateRequest,
    responses(
        (status = 201, description = "Certificate generated"),
        (status = 400, description = "Some session type has no completed session"),
        (status = 409, description = "Certificate already signed")
    ))]
pub async fn generate_certificate(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiJson(req): ApiJson<GenerateCertificateRequest>,
) -> ApiResult<impl IntoResponse> {
    let certificate = state
        .certificates
        .generate(&principal, req.student_id, req.semester_id)
        .await?;
    Ok(created(certificate))
}

#[utoipa::path(post, path = "/certificates/{id}/sign", tag = "certificates",
    params(("id" = i64, Path, description = "Certificate id")),
    responses(
        (status = 200, description = "Certificate signed"),
        (status = 409, description = "Certificate already signed")
    ))]
pub async fn sign_certificate(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    let certificate = state.certificates.sign(&principal, id).await?;
    Ok(ok_with_message(certificate, "Certificate signed"))
}
