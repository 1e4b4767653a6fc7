//! Drives the axum handlers directly against the in-memory gateway and checks
//! status codes and the response envelope.

use api_lib::adapters::{LogMailer, PdfCertificateRenderer};
use api_lib::config::Config;
use api_lib::error::ApiError;
use api_lib::web::extract::{ApiJson, ApiPath, ApiQuery};
use api_lib::web::handlers::{assignments, audit, certificates, semesters, sessions};
use api_lib::web::state::{AppState, Collaborators};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::Level;
use tutoring_core::memory::{FixedClock, InMemoryDocuments, InMemoryStore};
use tutoring_core::{Principal, Role, SessionForm};

struct TestApp {
    state: Arc<AppState>,
    store: Arc<InMemoryStore>,
    admin: Principal,
}

fn test_config() -> Arc<Config> {
    Arc::new(Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        database_max_connections: 1,
        log_level: Level::INFO,
        jwt_secret: "test-secret".to_string(),
        certificates_dir: std::env::temp_dir(),
        cors_origin: "http://localhost:3000".to_string(),
    })
}

fn app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let collaborators = Collaborators {
        renderer: Arc::new(PdfCertificateRenderer::default()),
        storage: Arc::new(InMemoryDocuments::default()),
        mailer: Arc::new(LogMailer),
        clock: Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap())),
    };
    TestApp {
        state: Arc::new(AppState::assemble(store.clone(), collaborators, test_config())),
        store,
        admin: Principal::new(1, Role::Admin).with_source_ip("198.51.100.7"),
    }
}

async fn body(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn respond<T: IntoResponse>(result: Result<T, ApiError>) -> (StatusCode, Value) {
    body(result.into_response()).await
}

fn semester_request(name: &str, status: &str) -> semesters::SemesterRequest {
    serde_json::from_value(json!({
        "name": name,
        "start_date": "2025-08-01",
        "end_date": "2025-12-15",
        "status": status,
    }))
    .unwrap()
}

async fn active_semester(app: &TestApp) -> i64 {
    let (status, body) = respond(
        semesters::create_semester(
            State(app.state.clone()),
            Extension(app.admin.clone()),
            ApiJson(semester_request("2025-II", "active")),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn creating_a_semester_wraps_it_in_the_envelope() {
    let app = app();
    let (status, body) = respond(
        semesters::create_semester(
            State(app.state.clone()),
            Extension(app.admin.clone()),
            ApiJson(semester_request("2025-II", "active")),
        )
        .await,
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["status"], json!("active"));
    assert!(body.get("message").is_none());

    let (status, body) = respond(semesters::current_semester(State(app.state.clone())).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], json!("2025-II"));
}

#[tokio::test]
async fn rule_violations_become_failure_envelopes() {
    let app = app();

    let (status, body) = respond(semesters::current_semester(State(app.state.clone())).await).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
    assert!(body.get("data").is_none());

    let (status, _) = respond(
        semesters::create_semester(
            State(app.state.clone()),
            Extension(Principal::new(5, Role::Tutor)),
            ApiJson(semester_request("2025-II", "active")),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut bad_dates = semester_request("2025-II", "scheduled");
    bad_dates.end_date = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
    let (status, _) = respond(
        semesters::create_semester(
            State(app.state.clone()),
            Extension(app.admin.clone()),
            ApiJson(bad_dates),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_assignment_is_a_conflict() {
    let app = app();
    let semester = active_semester(&app).await;
    let t7 = app.store.add_user("Tutor Seven", Role::Tutor, true);
    let t9 = app.store.add_user("Tutor Nine", Role::Tutor, true);
    let s42 = app.store.add_user("Student FortyTwo", Role::Student, true);

    let assign = |tutor_id: i64| {
        let state = app.state.clone();
        let admin = app.admin.clone();
        async move {
            let req: assignments::AssignRequest = serde_json::from_value(json!({
                "tutor_id": tutor_id,
                "student_id": s42,
            }))
            .unwrap();
            respond(assignments::create_assignment(State(state), Extension(admin), ApiJson(req)).await)
                .await
        }
    };

    let (status, body) = assign(t7).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["semester_id"], json!(semester));

    let (status, body) = assign(t9).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn session_lifecycle_through_the_handlers() {
    let app = app();
    let semester = active_semester(&app).await;
    let tutor_id = app.store.add_user("Ana Tutor", Role::Tutor, true);
    let student_id = app.store.add_user("Luis Student", Role::Student, true);
    let tutor = Principal::new(tutor_id, Role::Tutor);

    let req: assignments::AssignRequest = serde_json::from_value(json!({
        "tutor_id": tutor_id,
        "student_id": student_id,
        "semester_id": semester,
    }))
    .unwrap();
    let (_, body) = respond(
        assignments::create_assignment(
            State(app.state.clone()),
            Extension(app.admin.clone()),
            ApiJson(req),
        )
        .await,
    )
    .await;
    let assignment_id = body["data"]["id"].as_i64().unwrap();

    let create = |start: &str, end: &str| {
        serde_json::from_value::<sessions::CreateSessionRequest>(json!({
            "assignment_id": assignment_id,
            "date": "2025-09-03",
            "start_time": start,
            "end_time": end,
            "session_type": "academic",
            "modality": "in_person",
        }))
        .unwrap()
    };

    let (status, body) = respond(
        sessions::create_session(
            State(app.state.clone()),
            Extension(tutor.clone()),
            ApiJson(create("09:00:00", "10:00:00")),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], json!("scheduled"));
    let session_id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = respond(
        sessions::create_session(
            State(app.state.clone()),
            Extension(tutor.clone()),
            ApiJson(create("09:30:00", "10:30:00")),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let incomplete: SessionForm =
        serde_json::from_value(json!({ "type": "academic", "subject": "Calculus" })).unwrap();
    let (status, body) = respond(
        sessions::finalize_session(
            State(app.state.clone()),
            Extension(tutor.clone()),
            ApiPath(session_id),
            ApiJson(incomplete),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("topics"));

    let complete: SessionForm = serde_json::from_value(json!({
        "type": "academic",
        "subject": "Calculus",
        "topics": "Limits",
        "agreements": "Exercises 1-10",
    }))
    .unwrap();
    let (status, body) = respond(
        sessions::finalize_session(
            State(app.state.clone()),
            Extension(tutor.clone()),
            ApiPath(session_id),
            ApiJson(complete),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("completed"));

    let cancel: sessions::CancelRequest =
        serde_json::from_value(json!({ "reason": "too late" })).unwrap();
    let (status, _) = respond(
        sessions::cancel_session(
            State(app.state.clone()),
            Extension(tutor),
            ApiPath(session_id),
            ApiJson(cancel),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn certificate_generation_reports_missing_types() {
    let app = app();
    let semester = active_semester(&app).await;
    let student_id = app.store.add_user("Luis Student", Role::Student, true);
    let tutor_id = app.store.add_user("Ana Tutor", Role::Tutor, true);
    let req: assignments::AssignRequest = serde_json::from_value(json!({
        "tutor_id": tutor_id,
        "student_id": student_id,
    }))
    .unwrap();
    respond(
        assignments::create_assignment(
            State(app.state.clone()),
            Extension(app.admin.clone()),
            ApiJson(req),
        )
        .await,
    )
    .await;

    let req: certificates::GenerateCertificateRequest = serde_json::from_value(json!({
        "student_id": student_id,
        "semester_id": semester,
    }))
    .unwrap();
    let (status, body) = respond(
        certificates::generate_certificate(
            State(app.state.clone()),
            Extension(app.admin.clone()),
            ApiJson(req),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        json!("Missing completed sessions of type: academic, personal, professional")
    );
}

#[tokio::test]
async fn audit_log_is_admin_only_and_records_the_source_ip() {
    let app = app();
    active_semester(&app).await;

    let query = |page: Option<u32>| {
        ApiQuery(audit::AuditLogQuery {
            page,
            ..Default::default()
        })
    };

    let (status, _) = respond(
        audit::audit_log(
            State(app.state.clone()),
            Extension(Principal::new(2, Role::Verifier)),
            query(None),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = respond(
        audit::audit_log(
            State(app.state.clone()),
            Extension(app.admin.clone()),
            query(Some(1)),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], json!(1));
    let entry = &body["data"]["items"][0];
    assert_eq!(entry["action"], json!("semester.create"));
    assert_eq!(entry["actor_label"], json!("admin#1"));
    assert_eq!(entry["source_ip"], json!("198.51.100.7"));
}
