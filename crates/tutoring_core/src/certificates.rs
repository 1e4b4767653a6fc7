//! crates/tutoring_core/src/certificates.rs
//!
//! Certificates ("constancias") attest that a student completed at least one
//! session of each type in a semester. Regeneration overwrites the stored
//! document; signing is one-way.

use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::audit::AuditTrail;
use crate::auth::Principal;
use crate::domain::{Certificate, CertificateRecord, Role, SessionStatus, SessionType, UserAccount};
use crate::error::{ServiceError, ServiceResult};
use crate::notify::notify;
use crate::ports::{
    AssignmentStore, CertificateBundle, CertificateFilter, CertificateStore, Clock,
    DocumentRenderer, DocumentStorage, Mailer, SemesterStore, SessionFilter, SessionStore,
    UserDirectory,
};

/// Completed session counts per type; types without sessions are absent.
pub type CompletionTally = BTreeMap<SessionType, u32>;

/// Types with no completed session in the tally.
pub fn missing_types(tally: &CompletionTally) -> Vec<SessionType> {
    SessionType::ALL
        .into_iter()
        .filter(|t| tally.get(t).copied().unwrap_or(0) == 0)
        .collect()
}

/// Collaborators the certificate service needs besides the stores.
#[derive(Clone)]
pub struct CertificateOutputs {
    pub renderer: Arc<dyn DocumentRenderer>,
    pub storage: Arc<dyn DocumentStorage>,
    pub mailer: Arc<dyn Mailer>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Clone)]
pub struct CertificateService {
    certificates: Arc<dyn CertificateStore>,
    assignments: Arc<dyn AssignmentStore>,
    sessions: Arc<dyn SessionStore>,
    semesters: Arc<dyn SemesterStore>,
    users: Arc<dyn UserDirectory>,
    outputs: CertificateOutputs,
    audit: AuditTrail,
}

impl CertificateService {
    pub fn new(
        certificates: Arc<dyn CertificateStore>,
        assignments: Arc<dyn AssignmentStore>,
        sessions: Arc<dyn SessionStore>,
        semesters: Arc<dyn SemesterStore>,
        users: Arc<dyn UserDirectory>,
        outputs: CertificateOutputs,
        audit: AuditTrail,
    ) -> Self {
        Self {
            certificates,
            assignments,
            sessions,
            semesters,
            users,
            outputs,
            audit,
        }
    }

    pub async fn list(
        &self,
        principal: &Principal,
        mut filter: CertificateFilter,
    ) -> ServiceResult<Vec<Certificate>> {
        match principal.role {
            Role::Admin | Role::Verifier => {}
            Role::Tutor => filter.tutor_id = Some(principal.user_id),
            Role::Student => filter.student_id = Some(principal.user_id),
        }
        Ok(self.certificates.list_certificates(&filter).await?)
    }

    /// Completed sessions of a student in a semester, counted by type.
    pub async fn tally(&self, student_id: i64, semester_id: i64) -> ServiceResult<CompletionTally> {
        let sessions = self
            .sessions
            .list_sessions(&SessionFilter {
                student_id: Some(student_id),
                semester_id: Some(semester_id),
                status: Some(SessionStatus::Completed),
                ..Default::default()
            })
            .await?;
        let mut tally = CompletionTally::new();
        for session in sessions {
            *tally.entry(session.session_type).or_default() += 1;
        }
        Ok(tally)
    }

    pub async fn generate(
        &self,
        principal: &Principal,
        student_id: i64,
        semester_id: i64,
    ) -> ServiceResult<Certificate> {
        principal.require_any(&[Role::Admin, Role::Tutor])?;
        let semester = self.semesters.get_semester(semester_id).await?;
        let assignment = self
            .assignments
            .active_assignment_for(student_id, semester_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Student {} has no active assignment in semester {}",
                    student_id, semester_id
                ))
            })?;
        if principal.role == Role::Tutor && assignment.tutor_id != principal.user_id {
            return Err(ServiceError::Forbidden(
                "student is assigned to another tutor".to_string(),
            ));
        }

        let tally = self.tally(student_id, semester_id).await?;
        let missing = missing_types(&tally);
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|t| t.as_str()).collect();
            return Err(ServiceError::Validation(format!(
                "Missing completed sessions of type: {}",
                names.join(", ")
            )));
        }

        if let Some(existing) = self
            .certificates
            .find_certificate(student_id, assignment.id, semester_id)
            .await?
        {
            if existing.signed {
                return Err(ServiceError::Conflict(format!(
                    "Certificate {} is already signed",
                    existing.id
                )));
            }
        }

        let student = self.account(student_id).await?;
        let tutor = self.account(assignment.tutor_id).await?;
        let bundle = CertificateBundle {
            student_name: student.full_name.clone(),
            tutor_name: tutor.full_name.clone(),
            semester_name: semester.name.clone(),
            completed: tally.iter().map(|(t, n)| (*t, *n)).collect(),
            issued_on: self.outputs.clock.today(),
        };

        let document = self
            .outputs
            .renderer
            .render_certificate(&bundle)
            .await
            .map_err(|e| {
                error!(student_id, semester_id, "Certificate render failed: {}", e);
                ServiceError::Collaborator("render failed".to_string())
            })?;
        let name = format!(
            "constancia_{}_{}_{}.pdf",
            semester_id, student_id, assignment.id
        );
        let pdf_path = self
            .outputs
            .storage
            .store(&name, document)
            .await
            .map_err(|e| {
                error!(student_id, semester_id, "Certificate storage failed: {}", e);
                ServiceError::Collaborator("storing the certificate failed".to_string())
            })?;

        let certificate = self
            .certificates
            .upsert_certificate(&CertificateRecord {
                tutor_id: assignment.tutor_id,
                student_id,
                assignment_id: assignment.id,
                semester_id,
                pdf_path,
            })
            .await?;
        info!(
            certificate_id = certificate.id,
            student_id, semester_id, "Certificate generated"
        );
        self.audit
            .record(
                principal,
                "certificate.generate",
                format!(
                    "Generated certificate {} for student {} in semester {}",
                    certificate.id, student_id, semester_id
                ),
            )
            .await;
        notify(
            self.outputs.mailer.as_ref(),
            &student,
            "certificate_ready",
            json!({ "semester": semester.name, "certificate_id": certificate.id }),
        )
        .await;
        Ok(certificate)
    }

    pub async fn sign(&self, principal: &Principal, id: i64) -> ServiceResult<Certificate> {
        principal.require(Role::Admin)?;
        self.certificates.get_certificate(id).await?;
        if !self.certificates.mark_signed(id).await? {
            return Err(ServiceError::Conflict(format!(
                "Certificate {} is already signed",
                id
            )));
        }
        let certificate = self.certificates.get_certificate(id).await?;
        info!(certificate_id = id, "Certificate signed");
        self.audit
            .record(principal, "certificate.sign", format!("Signed certificate {}", id))
            .await;
        Ok(certificate)
    }

    async fn account(&self, id: i64) -> ServiceResult<UserAccount> {
        self.users
            .find_user(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_types_lists_absent_and_zero_counts() {
        let mut tally = CompletionTally::new();
        tally.insert(SessionType::Academic, 2);
        tally.insert(SessionType::Personal, 0);
        assert_eq!(
            missing_types(&tally),
            [SessionType::Personal, SessionType::Professional]
        );
        tally.insert(SessionType::Personal, 1);
        tally.insert(SessionType::Professional, 1);
        assert!(missing_types(&tally).is_empty());
    }
}
