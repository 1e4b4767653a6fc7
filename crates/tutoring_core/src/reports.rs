//! crates/tutoring_core/src/reports.rs
//!
//! Read-only compliance views for administrators and verifiers.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::auth::Principal;
use crate::certificates::{missing_types, CompletionTally};
use crate::domain::{AssignmentStatus, Role, SessionStatus, SessionType};
use crate::error::ServiceResult;
use crate::ports::{
    AssignmentFilter, AssignmentStore, CertificateFilter, CertificateStore, SemesterStore,
    SessionFilter, SessionStore, UserDirectory,
};

/// One tutor's standing in a semester.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TutorCompliance {
    pub tutor_id: i64,
    pub tutor_name: String,
    pub active_assignments: usize,
    pub completed_academic: u32,
    pub completed_personal: u32,
    pub completed_professional: u32,
    /// Assigned students with every session type completed.
    pub eligible_students: usize,
    pub certificates_generated: usize,
    pub certificates_signed: usize,
}

#[derive(Clone)]
pub struct ReportService {
    semesters: Arc<dyn SemesterStore>,
    assignments: Arc<dyn AssignmentStore>,
    sessions: Arc<dyn SessionStore>,
    certificates: Arc<dyn CertificateStore>,
    users: Arc<dyn UserDirectory>,
}

impl ReportService {
    pub fn new(
        semesters: Arc<dyn SemesterStore>,
        assignments: Arc<dyn AssignmentStore>,
        sessions: Arc<dyn SessionStore>,
        certificates: Arc<dyn CertificateStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            semesters,
            assignments,
            sessions,
            certificates,
            users,
        }
    }

    /// Per-tutor compliance for the semester, ordered by tutor name.
    pub async fn semester_compliance(
        &self,
        principal: &Principal,
        semester_id: i64,
    ) -> ServiceResult<Vec<TutorCompliance>> {
        principal.require_any(&[Role::Admin, Role::Verifier])?;
        self.semesters.get_semester(semester_id).await?;

        let active = self
            .assignments
            .list_assignments(&AssignmentFilter {
                semester_id: Some(semester_id),
                status: Some(AssignmentStatus::Active),
                ..Default::default()
            })
            .await?;
        let completed = self
            .sessions
            .list_sessions(&SessionFilter {
                semester_id: Some(semester_id),
                status: Some(SessionStatus::Completed),
                ..Default::default()
            })
            .await?;
        let certificates = self
            .certificates
            .list_certificates(&CertificateFilter {
                semester_id: Some(semester_id),
                ..Default::default()
            })
            .await?;

        let mut by_student: HashMap<i64, CompletionTally> = HashMap::new();
        for session in &completed {
            *by_student
                .entry(session.student_id)
                .or_default()
                .entry(session.session_type)
                .or_default() += 1;
        }

        let mut rows: BTreeMap<i64, TutorCompliance> = BTreeMap::new();
        for assignment in &active {
            let row = rows
                .entry(assignment.tutor_id)
                .or_insert_with(|| empty_row(assignment.tutor_id));
            row.active_assignments += 1;
            let eligible = by_student
                .get(&assignment.student_id)
                .map_or(false, |tally| missing_types(tally).is_empty());
            if eligible {
                row.eligible_students += 1;
            }
        }
        for session in &completed {
            let row = rows
                .entry(session.tutor_id)
                .or_insert_with(|| empty_row(session.tutor_id));
            match session.session_type {
                SessionType::Academic => row.completed_academic += 1,
                SessionType::Personal => row.completed_personal += 1,
                SessionType::Professional => row.completed_professional += 1,
            }
        }
        for certificate in &certificates {
            let row = rows
                .entry(certificate.tutor_id)
                .or_insert_with(|| empty_row(certificate.tutor_id));
            row.certificates_generated += 1;
            if certificate.signed {
                row.certificates_signed += 1;
            }
        }

        let mut report = Vec::with_capacity(rows.len());
        for (tutor_id, mut row) in rows {
            row.tutor_name = self
                .users
                .find_user(tutor_id)
                .await?
                .map(|u| u.full_name)
                .unwrap_or_else(|| format!("Tutor {}", tutor_id));
            report.push(row);
        }
        report.sort_by(|a, b| a.tutor_name.cmp(&b.tutor_name));
        Ok(report)
    }
}

fn empty_row(tutor_id: i64) -> TutorCompliance {
    TutorCompliance {
        tutor_id,
        tutor_name: String::new(),
        active_assignments: 0,
        completed_academic: 0,
        completed_personal: 0,
        completed_professional: 0,
        eligible_students: 0,
        certificates_generated: 0,
        certificates_signed: 0,
    }
}
