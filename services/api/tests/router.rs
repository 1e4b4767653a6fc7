//! Sends requests through the full router so the bearer-token middleware and
//! the extractor rejections are exercised together.

use api_lib::adapters::{LogMailer, PdfCertificateRenderer};
use api_lib::config::Config;
use api_lib::web::middleware::Claims;
use api_lib::web::router;
use api_lib::web::state::{AppState, Collaborators};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use tracing::Level;
use tutoring_core::memory::{FixedClock, InMemoryDocuments, InMemoryStore};
use tutoring_core::Role;

const SECRET: &str = "router-secret";

fn app() -> Router {
    let config = Arc::new(Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        database_max_connections: 1,
        log_level: Level::INFO,
        jwt_secret: SECRET.to_string(),
        certificates_dir: std::env::temp_dir(),
        cors_origin: "http://localhost:3000".to_string(),
    });
    let collaborators = Collaborators {
        renderer: Arc::new(PdfCertificateRenderer::default()),
        storage: Arc::new(InMemoryDocuments::default()),
        mailer: Arc::new(LogMailer),
        clock: Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap())),
    };
    let store = Arc::new(InMemoryStore::new());
    router(Arc::new(AppState::assemble(store, collaborators, config)))
}

fn bearer(sub: i64, role: Role) -> String {
    let claims = Claims {
        sub,
        role,
        exp: (Utc::now().timestamp() + 3600) as u64,
    };
    let jwt = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {}", jwt)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post_json(uri: &str, auth: Option<String>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn semester_body() -> Value {
    json!({
        "name": "2025-II",
        "start_date": "2025-08-01",
        "end_date": "2025-12-15",
    })
}

#[tokio::test]
async fn health_needs_no_token() {
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("ok"));
}

#[tokio::test]
async fn protected_routes_reject_missing_or_bad_tokens() {
    let request = Request::get("/semesters").body(Body::empty()).unwrap();
    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Authentication required"));

    let request = Request::get("/semesters")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn role_mismatch_through_the_router_is_forbidden() {
    let request = post_json("/semesters", Some(bearer(5, Role::Tutor)), semester_body());
    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], json!(false));

    let request = post_json("/semesters", Some(bearer(1, Role::Admin)), semester_body());
    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], json!("scheduled"));
}

#[tokio::test]
async fn malformed_input_is_a_validation_envelope() {
    let request = post_json(
        "/semesters",
        Some(bearer(1, Role::Admin)),
        json!({ "start_date": "2025-08-01", "end_date": "2025-12-15" }),
    );
    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert!(body["message"].as_str().unwrap().contains("name"));

    let request = post_json(
        "/semesters",
        Some(bearer(1, Role::Admin)),
        json!({ "name": "2025-II", "start_date": "August", "end_date": "2025-12-15" }),
    );
    let (status, _) = send(app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::get("/semesters/abc")
        .header(header::AUTHORIZATION, bearer(1, Role::Admin))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));

    let request = Request::get("/audit-log?page=first")
        .header(header::AUTHORIZATION, bearer(1, Role::Admin))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
