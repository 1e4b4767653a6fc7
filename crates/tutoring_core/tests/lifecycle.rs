//! End-to-end flows over the in-memory gateway: semester rollover,
//! assignment lineage, auto-assignment fairness and certificate eligibility.

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use tutoring_core::assignments::AssignmentManager;
use tutoring_core::audit::AuditTrail;
use tutoring_core::certificates::{CertificateOutputs, CertificateService};
use tutoring_core::domain::{
    AssignmentStatus, Modality, Role, SemesterDraft, SemesterStatus, SessionType,
};
use tutoring_core::memory::{FixedClock, InMemoryDocuments, InMemoryStore, OutboxMailer};
use tutoring_core::ports::{AssignmentFilter, AssignmentStore};
use tutoring_core::reports::ReportService;
use tutoring_core::semesters::SemesterManager;
use tutoring_core::sessions::{
    AcademicForm, NewSession, PersonalForm, ProfessionalForm, SessionForm, SessionTracker,
};
use tutoring_core::{Principal, ServiceError};

struct Harness {
    store: Arc<InMemoryStore>,
    documents: Arc<InMemoryDocuments>,
    mailer: Arc<OutboxMailer>,
    semesters: SemesterManager,
    assignments: AssignmentManager,
    sessions: SessionTracker,
    certificates: CertificateService,
    reports: ReportService,
    admin: Principal,
}

fn harness_with(documents: InMemoryDocuments) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let documents = Arc::new(documents);
    let mailer = Arc::new(OutboxMailer::default());
    let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 9, 1, 7, 0, 0).unwrap()));
    let audit = AuditTrail::new(store.clone());

    Harness {
        semesters: SemesterManager::new(store.clone(), audit.clone()),
        assignments: AssignmentManager::new(
            store.clone(),
            store.clone(),
            store.clone(),
            mailer.clone(),
            audit.clone(),
        ),
        sessions: SessionTracker::new(
            store.clone(),
            store.clone(),
            store.clone(),
            clock.clone(),
            audit.clone(),
        ),
        certificates: CertificateService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            CertificateOutputs {
                renderer: documents.clone(),
                storage: documents.clone(),
                mailer: mailer.clone(),
                clock,
            },
            audit,
        ),
        reports: ReportService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        ),
        store,
        documents,
        mailer,
        admin: Principal::new(1, Role::Admin).with_source_ip("127.0.0.1"),
    }
}

fn harness() -> Harness {
    harness_with(InMemoryDocuments::default())
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn hour(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, 0, 0).unwrap()
}

async fn active_semester(h: &Harness) -> i64 {
    h.semesters
        .create(
            &h.admin,
            SemesterDraft {
                name: "2025-II".to_string(),
                start_date: date(2025, 8, 1),
                end_date: date(2025, 12, 15),
                status: SemesterStatus::Active,
            },
        )
        .await
        .unwrap()
        .id
}

fn complete_form(kind: SessionType) -> SessionForm {
    let filled = || Some("filled in".to_string());
    match kind {
        SessionType::Academic => SessionForm::Academic(AcademicForm {
            subject: filled(),
            topics: filled(),
            difficulties: None,
            agreements: filled(),
        }),
        SessionType::Personal => SessionForm::Personal(PersonalForm {
            topic: filled(),
            observations: filled(),
            follow_up: None,
        }),
        SessionType::Professional => SessionForm::Professional(ProfessionalForm {
            area: filled(),
            activities: filled(),
            goals: filled(),
            observations: None,
        }),
    }
}

async fn complete_session(h: &Harness, tutor: &Principal, assignment_id: i64, kind: SessionType, day: u32) {
    let session = h
        .sessions
        .create(
            tutor,
            NewSession {
                assignment_id,
                date: date(2025, 9, day),
                start_time: hour(9),
                end_time: hour(10),
                session_type: kind,
                modality: Modality::Virtual,
                notes: None,
            },
        )
        .await
        .unwrap();
    h.sessions
        .finalize(tutor, session.id, complete_form(kind))
        .await
        .unwrap();
}

#[tokio::test]
async fn activating_a_new_semester_closes_the_old_one() {
    let h = harness();
    let old = h
        .semesters
        .create(
            &h.admin,
            SemesterDraft {
                name: "2025-I".to_string(),
                start_date: date(2025, 1, 15),
                end_date: date(2025, 6, 30),
                status: SemesterStatus::Active,
            },
        )
        .await
        .unwrap();

    let new = active_semester(&h).await;

    assert_eq!(
        h.semesters.get(old.id).await.unwrap().status,
        SemesterStatus::Closed
    );
    assert_eq!(h.semesters.current().await.unwrap().id, new);
    let active = h
        .semesters
        .list()
        .await
        .unwrap()
        .into_iter()
        .filter(|s| s.status == SemesterStatus::Active)
        .count();
    assert_eq!(active, 1);
}

#[tokio::test]
async fn a_student_holds_one_active_assignment_per_semester() {
    let h = harness();
    let semester = active_semester(&h).await;
    let t7 = h.store.add_user("Tutor Seven", Role::Tutor, true);
    let t9 = h.store.add_user("Tutor Nine", Role::Tutor, true);
    let s42 = h.store.add_user("Student FortyTwo", Role::Student, true);

    h.assignments
        .assign(&h.admin, t7, s42, Some(semester))
        .await
        .unwrap();
    let second = h.assignments.assign(&h.admin, t9, s42, Some(semester)).await;
    assert!(matches!(second, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn concurrent_assignments_for_one_student_admit_only_one() {
    let h = harness();
    let semester = active_semester(&h).await;
    let t7 = h.store.add_user("Tutor Seven", Role::Tutor, true);
    let t9 = h.store.add_user("Tutor Nine", Role::Tutor, true);
    let s42 = h.store.add_user("Student FortyTwo", Role::Student, true);

    let (a, b) = tokio::join!(
        h.assignments.assign(&h.admin, t7, s42, Some(semester)),
        h.assignments.assign(&h.admin, t9, s42, Some(semester)),
    );
    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);

    let active = h
        .store
        .list_assignments(&AssignmentFilter {
            student_id: Some(s42),
            semester_id: Some(semester),
            status: Some(AssignmentStatus::Active),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn reassignment_preserves_lineage() {
    let h = harness();
    let semester = active_semester(&h).await;
    let t7 = h.store.add_user("Tutor Seven", Role::Tutor, true);
    let t9 = h.store.add_user("Tutor Nine", Role::Tutor, true);
    let s42 = h.store.add_user("Student FortyTwo", Role::Student, true);
    let original = h
        .assignments
        .assign(&h.admin, t7, s42, Some(semester))
        .await
        .unwrap();

    let (old, new) = h
        .assignments
        .reassign(&h.admin, original.id, t9)
        .await
        .unwrap();

    assert_eq!(old.id, original.id);
    assert_eq!(old.status, AssignmentStatus::Inactive);
    assert_eq!(new.tutor_id, t9);
    assert_eq!(new.student_id, s42);
    assert_eq!(new.semester_id, semester);
    assert_eq!(new.status, AssignmentStatus::Active);

    let rows = h
        .store
        .list_assignments(&AssignmentFilter {
            student_id: Some(s42),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows.iter()
            .filter(|r| r.status == AssignmentStatus::Active)
            .count(),
        1
    );
}

#[tokio::test]
async fn auto_assign_balances_students_across_all_tutors() {
    let h = harness();
    let semester = active_semester(&h).await;
    let tutors: Vec<i64> = (0..4)
        .map(|i| h.store.add_user(&format!("Tutor {}", i), Role::Tutor, true))
        .collect();
    h.store.add_user("Retired Tutor", Role::Tutor, false);
    for i in 0..23 {
        h.store.add_user(&format!("Student {:02}", i), Role::Student, true);
    }
    h.store.add_user("Dropped Student", Role::Student, false);

    // One student already placed by hand stays out of the batch.
    let placed = h.store.add_user("Placed Student", Role::Student, true);
    h.assignments
        .assign(&h.admin, tutors[0], placed, Some(semester))
        .await
        .unwrap();

    let outcome = h
        .assignments
        .auto_assign(&h.admin, semester, None)
        .await
        .unwrap();
    assert_eq!(outcome.assignments.len(), 23);
    assert_eq!(outcome.per_tutor.len(), tutors.len());

    let mut counts: HashMap<i64, usize> = HashMap::new();
    for a in &outcome.assignments {
        *counts.entry(a.tutor_id).or_default() += 1;
    }
    let base = 23 / tutors.len();
    for tutor in &tutors {
        let c = counts.get(tutor).copied().unwrap_or(0);
        assert!(c == base || c == base + 1, "tutor {} got {}", tutor, c);
    }

    assert!(h
        .assignments
        .unassigned(&h.admin, semester)
        .await
        .unwrap()
        .is_empty());
    assert!(matches!(
        h.assignments.auto_assign(&h.admin, semester, None).await,
        Err(ServiceError::Validation(_))
    ));
}

#[tokio::test]
async fn certificate_needs_every_session_type() {
    let h = harness();
    let semester = active_semester(&h).await;
    let tutor_id = h.store.add_user("Ana Tutor", Role::Tutor, true);
    let student = h.store.add_user("Luis Student", Role::Student, true);
    let tutor = Principal::new(tutor_id, Role::Tutor);
    let assignment = h
        .assignments
        .assign(&h.admin, tutor_id, student, Some(semester))
        .await
        .unwrap();

    complete_session(&h, &tutor, assignment.id, SessionType::Academic, 2).await;
    complete_session(&h, &tutor, assignment.id, SessionType::Personal, 3).await;

    match h.certificates.generate(&tutor, student, semester).await {
        Err(ServiceError::Validation(msg)) => assert!(msg.contains("professional")),
        other => panic!("expected validation failure, got {:?}", other),
    }

    complete_session(&h, &tutor, assignment.id, SessionType::Professional, 4).await;
    let certificate = h
        .certificates
        .generate(&tutor, student, semester)
        .await
        .unwrap();
    assert!(!certificate.signed);
    let name = certificate.pdf_path.trim_start_matches("memory://");
    let document = h.documents.document(name).unwrap();
    assert!(String::from_utf8_lossy(&document).contains("Luis Student|Ana Tutor|2025-II"));

    // Regenerating overwrites instead of duplicating.
    let again = h
        .certificates
        .generate(&h.admin, student, semester)
        .await
        .unwrap();
    assert_eq!(again.id, certificate.id);

    let signed = h.certificates.sign(&h.admin, certificate.id).await.unwrap();
    assert!(signed.signed);
    assert!(signed.signed_at.is_some());
    assert!(matches!(
        h.certificates.sign(&h.admin, certificate.id).await,
        Err(ServiceError::Conflict(_))
    ));
    assert!(matches!(
        h.certificates.generate(&tutor, student, semester).await,
        Err(ServiceError::Conflict(_))
    ));

    let templates: Vec<String> = h.mailer.sent().into_iter().map(|(_, t, _)| t).collect();
    assert!(templates.contains(&"certificate_ready".to_string()));

    let report = h
        .reports
        .semester_compliance(&Principal::new(99, Role::Verifier), semester)
        .await
        .unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].tutor_name, "Ana Tutor");
    assert_eq!(report[0].active_assignments, 1);
    assert_eq!(report[0].eligible_students, 1);
    assert_eq!(report[0].completed_professional, 1);
    assert_eq!(report[0].certificates_signed, 1);
}

#[tokio::test]
async fn render_failures_surface_as_collaborator_errors() {
    let h = harness_with(InMemoryDocuments::failing());
    let semester = active_semester(&h).await;
    let tutor_id = h.store.add_user("Ana Tutor", Role::Tutor, true);
    let student = h.store.add_user("Luis Student", Role::Student, true);
    let tutor = Principal::new(tutor_id, Role::Tutor);
    let assignment = h
        .assignments
        .assign(&h.admin, tutor_id, student, Some(semester))
        .await
        .unwrap();
    for (i, kind) in SessionType::ALL.into_iter().enumerate() {
        complete_session(&h, &tutor, assignment.id, kind, 2 + i as u32).await;
    }

    assert!(matches!(
        h.certificates.generate(&tutor, student, semester).await,
        Err(ServiceError::Collaborator(_))
    ));
    assert!(h
        .certificates
        .list(&h.admin, Default::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn sessions_need_an_active_semester() {
    let h = harness();
    let semester = active_semester(&h).await;
    let tutor_id = h.store.add_user("Ana Tutor", Role::Tutor, true);
    let student = h.store.add_user("Luis Student", Role::Student, true);
    let assignment = h
        .assignments
        .assign(&h.admin, tutor_id, student, Some(semester))
        .await
        .unwrap();
    h.semesters.close(&h.admin, semester).await.unwrap();

    let result = h
        .sessions
        .create(
            &Principal::new(tutor_id, Role::Tutor),
            NewSession {
                assignment_id: assignment.id,
                date: date(2025, 9, 5),
                start_time: hour(9),
                end_time: hour(10),
                session_type: SessionType::Academic,
                modality: Modality::InPerson,
                notes: None,
            },
        )
        .await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}
