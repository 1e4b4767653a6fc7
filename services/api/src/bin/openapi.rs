//! services/api/src/bin/openapi.rs
//!
//! Writes the tutoring API's OpenAPI document to disk so clients can be
//! generated without a running server. The output path defaults to
//! `openapi.json` and may be given as the first argument.

use api_lib::error::ApiError;
use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<(), ApiError> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());

    let doc = ApiDoc::openapi();
    let json = doc
        .to_pretty_json()
        .map_err(|e| ApiError::Internal(format!("Could not serialize the API document: {}", e)))?;
    std::fs::write(&path, json)?;

    println!(
        "Wrote {} v{} ({} paths) to {}",
        doc.info.title,
        doc.info.version,
        doc.paths.paths.len(),
        path
    );
    Ok(())
}
