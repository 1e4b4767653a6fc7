pub mod envelope;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod rest;
pub mod state;

pub use middleware::require_auth;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use handlers::{assignments, audit, certificates, semesters, sessions};
use state::AppState;

/// Builds the API router. Everything except `/health` needs a bearer token.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new().route("/health", get(handlers::health));

    let protected_routes = Router::new()
        .route(
            "/semesters",
            get(semesters::list_semesters).post(semesters::create_semester),
        )
        .route("/semesters/current", get(semesters::current_semester))
        .route(
            "/semesters/{id}",
            get(semesters::get_semester).put(semesters::update_semester),
        )
        .route("/semesters/{id}/activate", post(semesters::activate_semester))
        .route("/semesters/{id}/close", post(semesters::close_semester))
        .route("/semesters/{id}/unassigned", get(semesters::unassigned_students))
        .route("/semesters/{id}/compliance", get(semesters::semester_compliance))
        .route(
            "/assignments",
            get(assignments::list_assignments).post(assignments::create_assignment),
        )
        .route("/assignments/auto", post(assignments::auto_assign))
        .route("/assignments/{id}/unassign", post(assignments::unassign))
        .route("/assignments/{id}/reassign", post(assignments::reassign))
        .route(
            "/sessions",
            get(sessions::list_sessions).post(sessions::create_session),
        )
        .route("/sessions/{id}/reschedule", post(sessions::reschedule_session))
        .route("/sessions/{id}/draft", post(sessions::save_draft))
        .route("/sessions/{id}/finalize", post(sessions::finalize_session))
        .route("/sessions/{id}/cancel", post(sessions::cancel_session))
        .route(
            "/certificates",
            get(certificates::list_certificates).post(certificates::generate_certificate),
        )
        .route("/certificates/{id}/sign", post(certificates::sign_certificate))
        .route("/audit-log", get(audit::audit_log))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
