//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification.

use crate::web::handlers::{
    self, assignments, audit, certificates, semesters, sessions,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        semesters::list_semesters,
        semesters::current_semester,
        semesters::get_semester,
        semesters::create_semester,
        semesters::update_semester,
        semesters::activate_semester,
        semesters::close_semester,
        semesters::unassigned_students,
        semesters::semester_compliance,
        assignments::list_assignments,
        assignments::create_assignment,
        assignments::auto_assign,
        assignments::unassign,
        assignments::reassign,
        sessions::list_sessions,
        sessions::create_session,
        sessions::reschedule_session,
        sessions::save_draft,
        sessions::finalize_session,
        sessions::cancel_session,
        certificates::list_certificates,
        certificates::generate_certificate,
        certificates::sign_certificate,
        audit::audit_log,
    ),
    components(
        schemas(
            semesters::SemesterRequest,
            assignments::AssignRequest,
            assignments::AutoAssignRequest,
            assignments::ReassignRequest,
            sessions::CreateSessionRequest,
            sessions::RescheduleRequest,
            sessions::CancelRequest,
            certificates::GenerateCertificateRequest,
        )
    ),
    modifiers(&BearerAuth),
    security(("bearer" = [])),
    tags(
        (name = "Tutoring API", description = "Semesters, tutor assignments, sessions and certificates.")
    )
)]
pub struct ApiDoc;

/// Registers the bearer-token scheme every protected route expects.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
