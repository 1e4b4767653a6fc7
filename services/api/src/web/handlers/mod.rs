//! services/api/src/web/handlers/mod.rs
//!
//! Axum handlers. Each one unwraps the request, calls exactly one manager
//! operation and wraps the result in the response envelope.

pub mod assignments;
pub mod audit;
pub mod certificates;
pub mod semesters;
pub mod sessions;

use axum::response::IntoResponse;
use serde_json::json;

use crate::web::envelope::ok;

#[utoipa::path(get, path = "/health", tag = "health",
    responses((status = 200, description = "The service is up")))]
pub async fn health() -> impl IntoResponse {
    ok(json!({ "status": "ok" }))
}
