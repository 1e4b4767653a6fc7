//! crates/tutoring_core/src/memory.rs
//!
//! An in-memory implementation of every persistence port. Each call holds the
//! state lock for its whole duration, which gives the same all-or-nothing
//! behaviour the PostgreSQL adapter gets from transactions.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::domain::{
    Assignment, AssignmentStatus, AuditLogEntry, Certificate, CertificateRecord, NewAssignment,
    NewAuditEntry, NewSessionRecord, Role, Semester, SemesterDraft, SemesterStatus, Session,
    SessionStatus, UserAccount,
};
use crate::ports::{
    AssignmentFilter, AssignmentStore, AuditFilter, AuditStore, CertificateBundle,
    CertificateFilter, CertificateStore, Clock, DocumentRenderer, DocumentStorage, Mailer, Page,
    PortError, PortResult, SemesterStore, SessionFilter, SessionStore, SessionUpdate,
    UserDirectory,
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<UserAccount>,
    semesters: Vec<Semester>,
    assignments: Vec<Assignment>,
    sessions: Vec<Session>,
    certificates: Vec<Certificate>,
    audit: Vec<AuditLogEntry>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn semester_mut(&mut self, id: i64) -> PortResult<&mut Semester> {
        self.semesters
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Semester {} not found", id)))
    }

    fn close_active_except(&mut self, keep: Option<i64>) {
        for semester in self.semesters.iter_mut() {
            if semester.status == SemesterStatus::Active && Some(semester.id) != keep {
                semester.status = SemesterStatus::Closed;
            }
        }
    }

    fn has_active_assignment(&self, student_id: i64, semester_id: i64) -> bool {
        self.assignments.iter().any(|a| {
            a.student_id == student_id
                && a.semester_id == semester_id
                && a.status == AssignmentStatus::Active
        })
    }

    fn push_assignment(&mut self, new: NewAssignment) -> PortResult<Assignment> {
        if self.has_active_assignment(new.student_id, new.semester_id) {
            return Err(PortError::Conflict(format!(
                "Student {} already has an active assignment in semester {}",
                new.student_id, new.semester_id
            )));
        }
        let assignment = Assignment {
            id: self.next_id(),
            tutor_id: new.tutor_id,
            student_id: new.student_id,
            semester_id: new.semester_id,
            assigned_at: Utc::now(),
            status: AssignmentStatus::Active,
            ended_at: None,
        };
        self.assignments.push(assignment.clone());
        Ok(assignment)
    }
}

/// Process-local store backing the unit tests and the handler tests.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| PortError::Unexpected("in-memory store poisoned".to_string()))
    }

    /// Adds a directory account and returns its id.
    pub fn add_user(&self, full_name: &str, role: Role, active: bool) -> i64 {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let id = tables.next_id();
        tables.users.push(UserAccount {
            id,
            full_name: full_name.to_string(),
            email: format!("{}@tutoring.test", full_name.to_lowercase().replace(' ', ".")),
            role,
            active,
        });
        id
    }
}

#[async_trait]
impl SemesterStore for InMemoryStore {
    async fn list_semesters(&self) -> PortResult<Vec<Semester>> {
        let mut semesters = self.lock()?.semesters.clone();
        semesters.sort_by(|a, b| b.start_date.cmp(&a.start_date).then(b.id.cmp(&a.id)));
        Ok(semesters)
    }

    async fn get_semester(&self, id: i64) -> PortResult<Semester> {
        Ok(self.lock()?.semester_mut(id)?.clone())
    }

    async fn active_semester(&self) -> PortResult<Option<Semester>> {
        Ok(self
            .lock()?
            .semesters
            .iter()
            .find(|s| s.status == SemesterStatus::Active)
            .cloned())
    }

    async fn insert_semester(&self, draft: &SemesterDraft) -> PortResult<Semester> {
        let mut tables = self.lock()?;
        if draft.status == SemesterStatus::Active {
            tables.close_active_except(None);
        }
        let semester = Semester {
            id: tables.next_id(),
            name: draft.name.clone(),
            start_date: draft.start_date,
            end_date: draft.end_date,
            status: draft.status,
            created_at: Utc::now(),
        };
        tables.semesters.push(semester.clone());
        Ok(semester)
    }

    async fn update_semester(&self, id: i64, draft: &SemesterDraft) -> PortResult<Semester> {
        let mut tables = self.lock()?;
        tables.semester_mut(id)?;
        if draft.status == SemesterStatus::Active {
            tables.close_active_except(Some(id));
        }
        let semester = tables.semester_mut(id)?;
        semester.name = draft.name.clone();
        semester.start_date = draft.start_date;
        semester.end_date = draft.end_date;
        semester.status = draft.status;
        Ok(semester.clone())
    }

    async fn close_semester(&self, id: i64) -> PortResult<u64> {
        let mut tables = self.lock()?;
        match tables.semesters.iter_mut().find(|s| s.id == id) {
            Some(s) if s.status != SemesterStatus::Closed => {
                s.status = SemesterStatus::Closed;
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

#[async_trait]
impl AssignmentStore for InMemoryStore {
    async fn get_assignment(&self, id: i64) -> PortResult<Assignment> {
        self.lock()?
            .assignments
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Assignment {} not found", id)))
    }

    async fn list_assignments(&self, filter: &AssignmentFilter) -> PortResult<Vec<Assignment>> {
        Ok(self
            .lock()?
            .assignments
            .iter()
            .filter(|a| filter.semester_id.map_or(true, |v| a.semester_id == v))
            .filter(|a| filter.tutor_id.map_or(true, |v| a.tutor_id == v))
            .filter(|a| filter.student_id.map_or(true, |v| a.student_id == v))
            .filter(|a| filter.status.map_or(true, |v| a.status == v))
            .cloned()
            .collect())
    }

    async fn active_assignment_for(
        &self,
        student_id: i64,
        semester_id: i64,
    ) -> PortResult<Option<Assignment>> {
        Ok(self
            .lock()?
            .assignments
            .iter()
            .find(|a| {
                a.student_id == student_id
                    && a.semester_id == semester_id
                    && a.status == AssignmentStatus::Active
            })
            .cloned())
    }

    async fn insert_assignment(&self, new: NewAssignment) -> PortResult<Assignment> {
        self.lock()?.push_assignment(new)
    }

    async fn deactivate_assignment(&self, id: i64) -> PortResult<bool> {
        let mut tables = self.lock()?;
        let assignment = tables
            .assignments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Assignment {} not found", id)))?;
        if assignment.status == AssignmentStatus::Inactive {
            return Ok(false);
        }
        assignment.status = AssignmentStatus::Inactive;
        assignment.ended_at = Some(Utc::now());
        Ok(true)
    }

    async fn replace_assignment(
        &self,
        id: i64,
        new_tutor_id: i64,
    ) -> PortResult<(Assignment, Assignment)> {
        let mut tables = self.lock()?;
        let index = tables
            .assignments
            .iter()
            .position(|a| a.id == id && a.status == AssignmentStatus::Active)
            .ok_or_else(|| PortError::NotFound(format!("Active assignment {} not found", id)))?;

        tables.assignments[index].status = AssignmentStatus::Inactive;
        tables.assignments[index].ended_at = Some(Utc::now());
        let old = tables.assignments[index].clone();

        let new = tables.push_assignment(NewAssignment {
            tutor_id: new_tutor_id,
            student_id: old.student_id,
            semester_id: old.semester_id,
        })?;
        Ok((old, new))
    }

    async fn insert_assignments(&self, batch: &[NewAssignment]) -> PortResult<Vec<Assignment>> {
        let mut tables = self.lock()?;
        // Validate the whole batch before touching the table.
        let mut seen = std::collections::HashSet::new();
        for new in batch {
            if tables.has_active_assignment(new.student_id, new.semester_id)
                || !seen.insert((new.student_id, new.semester_id))
            {
                return Err(PortError::Conflict(format!(
                    "Student {} already has an active assignment in semester {}",
                    new.student_id, new.semester_id
                )));
            }
        }
        batch.iter().map(|new| tables.push_assignment(*new)).collect()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn get_session(&self, id: i64) -> PortResult<Session> {
        self.lock()?
            .sessions
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", id)))
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> PortResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .lock()?
            .sessions
            .iter()
            .filter(|s| filter.tutor_id.map_or(true, |v| s.tutor_id == v))
            .filter(|s| filter.student_id.map_or(true, |v| s.student_id == v))
            .filter(|s| filter.semester_id.map_or(true, |v| s.semester_id == v))
            .filter(|s| filter.status.map_or(true, |v| s.status == v))
            .filter(|s| filter.session_type.map_or(true, |v| s.session_type == v))
            .cloned()
            .collect();
        sessions.sort_by_key(|s| (s.date, s.start_time, s.id));
        Ok(sessions)
    }

    async fn overlapping_sessions(
        &self,
        tutor_id: i64,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude_id: Option<i64>,
    ) -> PortResult<Vec<Session>> {
        Ok(self
            .lock()?
            .sessions
            .iter()
            .filter(|s| s.tutor_id == tutor_id && Some(s.id) != exclude_id)
            .filter(|s| s.status.occupies_calendar() && s.overlaps(date, start, end))
            .cloned()
            .collect())
    }

    async fn insert_session(&self, new: &NewSessionRecord) -> PortResult<Session> {
        let mut tables = self.lock()?;
        let session = Session {
            id: tables.next_id(),
            assignment_id: new.assignment_id,
            tutor_id: new.tutor_id,
            student_id: new.student_id,
            semester_id: new.semester_id,
            session_type: new.session_type,
            date: new.date,
            start_time: new.start_time,
            end_time: new.end_time,
            modality: new.modality,
            status: SessionStatus::Scheduled,
            notes: new.notes.clone(),
            completed_at: None,
            cancellation_reason: None,
            cancelled_at: None,
            created_at: Utc::now(),
        };
        tables.sessions.push(session.clone());
        Ok(session)
    }

    async fn update_session(&self, id: i64, update: &SessionUpdate) -> PortResult<Session> {
        let mut tables = self.lock()?;
        let session = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", id)))?;
        session.date = update.date;
        session.start_time = update.start_time;
        session.end_time = update.end_time;
        session.status = update.status;
        session.notes = update.notes.clone();
        session.completed_at = update.completed_at;
        session.cancellation_reason = update.cancellation_reason.clone();
        session.cancelled_at = update.cancelled_at;
        Ok(session.clone())
    }
}

#[async_trait]
impl CertificateStore for InMemoryStore {
    async fn get_certificate(&self, id: i64) -> PortResult<Certificate> {
        self.lock()?
            .certificates
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Certificate {} not found", id)))
    }

    async fn find_certificate(
        &self,
        student_id: i64,
        assignment_id: i64,
        semester_id: i64,
    ) -> PortResult<Option<Certificate>> {
        Ok(self
            .lock()?
            .certificates
            .iter()
            .find(|c| {
                c.student_id == student_id
                    && c.assignment_id == assignment_id
                    && c.semester_id == semester_id
            })
            .cloned())
    }

    async fn list_certificates(&self, filter: &CertificateFilter) -> PortResult<Vec<Certificate>> {
        Ok(self
            .lock()?
            .certificates
            .iter()
            .filter(|c| filter.semester_id.map_or(true, |v| c.semester_id == v))
            .filter(|c| filter.student_id.map_or(true, |v| c.student_id == v))
            .filter(|c| filter.tutor_id.map_or(true, |v| c.tutor_id == v))
            .cloned()
            .collect())
    }

    async fn upsert_certificate(&self, record: &CertificateRecord) -> PortResult<Certificate> {
        let mut tables = self.lock()?;
        if let Some(existing) = tables.certificates.iter_mut().find(|c| {
            c.student_id == record.student_id
                && c.assignment_id == record.assignment_id
                && c.semester_id == record.semester_id
        }) {
            existing.pdf_path = record.pdf_path.clone();
            existing.generated_at = Utc::now();
            return Ok(existing.clone());
        }
        let certificate = Certificate {
            id: tables.next_id(),
            tutor_id: record.tutor_id,
            student_id: record.student_id,
            assignment_id: record.assignment_id,
            semester_id: record.semester_id,
            pdf_path: record.pdf_path.clone(),
            generated_at: Utc::now(),
            signed: false,
            signed_at: None,
        };
        tables.certificates.push(certificate.clone());
        Ok(certificate)
    }

    async fn mark_signed(&self, id: i64) -> PortResult<bool> {
        let mut tables = self.lock()?;
        let certificate = tables
            .certificates
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Certificate {} not found", id)))?;
        if certificate.signed {
            return Ok(false);
        }
        certificate.signed = true;
        certificate.signed_at = Some(Utc::now());
        Ok(true)
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn find_user(&self, id: i64) -> PortResult<Option<UserAccount>> {
        Ok(self.lock()?.users.iter().find(|u| u.id == id).cloned())
    }

    async fn active_users_with_role(&self, role: Role) -> PortResult<Vec<UserAccount>> {
        let mut users: Vec<UserAccount> = self
            .lock()?
            .users
            .iter()
            .filter(|u| u.is_active_with_role(role))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));
        Ok(users)
    }
}

#[async_trait]
impl AuditStore for InMemoryStore {
    async fn append_audit(&self, entry: &NewAuditEntry) -> PortResult<AuditLogEntry> {
        let mut tables = self.lock()?;
        let logged = AuditLogEntry {
            id: tables.next_id(),
            actor_id: entry.actor_id,
            actor_label: entry.actor_label.clone(),
            action: entry.action.clone(),
            description: entry.description.clone(),
            timestamp: Utc::now(),
            source_ip: entry.source_ip.clone(),
        };
        tables.audit.push(logged.clone());
        Ok(logged)
    }

    async fn query_audit(
        &self,
        filter: &AuditFilter,
        page: u32,
        per_page: u32,
    ) -> PortResult<Page<AuditLogEntry>> {
        let tables = self.lock()?;
        let matching: Vec<&AuditLogEntry> = tables
            .audit
            .iter()
            .rev()
            .filter(|e| filter.actor_id.map_or(true, |v| e.actor_id == v))
            .filter(|e| filter.action.as_deref().map_or(true, |v| e.action == v))
            .collect();
        let offset = (page.saturating_sub(1) as usize).saturating_mul(per_page as usize);
        Ok(Page {
            total: matching.len() as u64,
            items: matching
                .into_iter()
                .skip(offset)
                .take(per_page as usize)
                .cloned()
                .collect(),
            page,
            per_page,
        })
    }
}

//=========================================================================================
// Collaborator Doubles
//=========================================================================================

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A mailer that keeps every message instead of sending it.
#[derive(Default)]
pub struct OutboxMailer {
    sent: Mutex<Vec<(String, String, serde_json::Value)>>,
}

impl OutboxMailer {
    /// `(recipient, template, data)` for every message sent so far.
    pub fn sent(&self) -> Vec<(String, String, serde_json::Value)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(
        &self,
        recipient: &str,
        template: &str,
        data: &serde_json::Value,
    ) -> PortResult<()> {
        self.sent
            .lock()
            .map_err(|_| PortError::Unexpected("outbox poisoned".to_string()))?
            .push((recipient.to_string(), template.to_string(), data.clone()));
        Ok(())
    }
}

/// Renders certificates as plain text and keeps stored documents in a map.
#[derive(Default)]
pub struct InMemoryDocuments {
    documents: Mutex<HashMap<String, Bytes>>,
    fail_rendering: bool,
}

impl InMemoryDocuments {
    pub fn failing() -> Self {
        Self {
            fail_rendering: true,
            ..Default::default()
        }
    }

    pub fn document(&self, name: &str) -> Option<Bytes> {
        self.documents.lock().ok()?.get(name).cloned()
    }
}

#[async_trait]
impl DocumentRenderer for InMemoryDocuments {
    async fn render_certificate(&self, bundle: &CertificateBundle) -> PortResult<Bytes> {
        if self.fail_rendering {
            return Err(PortError::Unexpected("renderer unavailable".to_string()));
        }
        let counts: Vec<String> = bundle
            .completed
            .iter()
            .map(|(t, n)| format!("{}={}", t, n))
            .collect();
        Ok(Bytes::from(format!(
            "{}|{}|{}|{}|{}",
            bundle.student_name,
            bundle.tutor_name,
            bundle.semester_name,
            counts.join(","),
            bundle.issued_on
        )))
    }
}

#[async_trait]
impl DocumentStorage for InMemoryDocuments {
    async fn store(&self, name: &str, document: Bytes) -> PortResult<String> {
        self.documents
            .lock()
            .map_err(|_| PortError::Unexpected("document map poisoned".to_string()))?
            .insert(name.to_string(), document);
        Ok(format!("memory://{}", name))
    }
}
