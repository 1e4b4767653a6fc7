//! crates/tutoring_core/src/ports.rs
//!
//! Defines the service contracts (traits) the tutoring core depends on.
//! The store traits together form the persistence gateway; every method that
//! must preserve an invariant across several rows is a single call so the
//! adapter can run it inside one transaction.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::domain::{
    Assignment, AssignmentStatus, AuditLogEntry, Certificate, CertificateRecord, NewAssignment,
    NewAuditEntry, NewSessionRecord, Role, Semester, SemesterDraft, Session, SessionStatus,
    SessionType, UserAccount,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness rule enforced by the store rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Query Filters
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentFilter {
    pub semester_id: Option<i64>,
    pub tutor_id: Option<i64>,
    pub student_id: Option<i64>,
    pub status: Option<AssignmentStatus>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionFilter {
    pub tutor_id: Option<i64>,
    pub student_id: Option<i64>,
    pub semester_id: Option<i64>,
    pub status: Option<SessionStatus>,
    pub session_type: Option<SessionType>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CertificateFilter {
    pub semester_id: Option<i64>,
    pub student_id: Option<i64>,
    pub tutor_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
    pub actor_id: Option<i64>,
    pub action: Option<String>,
}

/// One page of a paginated read.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

/// The field values a session update writes back.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUpdate {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: SessionStatus,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl From<&Session> for SessionUpdate {
    fn from(session: &Session) -> Self {
        Self {
            date: session.date,
            start_time: session.start_time,
            end_time: session.end_time,
            status: session.status,
            notes: session.notes.clone(),
            completed_at: session.completed_at,
            cancellation_reason: session.cancellation_reason.clone(),
            cancelled_at: session.cancelled_at,
        }
    }
}

//=========================================================================================
// Persistence Gateway Ports
//=========================================================================================

#[async_trait]
pub trait SemesterStore: Send + Sync {
    async fn list_semesters(&self) -> PortResult<Vec<Semester>>;

    async fn get_semester(&self, id: i64) -> PortResult<Semester>;

    async fn active_semester(&self) -> PortResult<Option<Semester>>;

    /// Inserts a semester. When the draft is `Active`, every other active
    /// semester is closed in the same transaction.
    async fn insert_semester(&self, draft: &SemesterDraft) -> PortResult<Semester>;

    /// Overwrites a semester. When the draft is `Active`, every *other*
    /// active semester is closed in the same transaction.
    async fn update_semester(&self, id: i64, draft: &SemesterDraft) -> PortResult<Semester>;

    /// Marks a semester closed and returns the number of rows affected.
    /// Already-closed semesters are not counted.
    async fn close_semester(&self, id: i64) -> PortResult<u64>;
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn get_assignment(&self, id: i64) -> PortResult<Assignment>;

    async fn list_assignments(&self, filter: &AssignmentFilter) -> PortResult<Vec<Assignment>>;

    async fn active_assignment_for(
        &self,
        student_id: i64,
        semester_id: i64,
    ) -> PortResult<Option<Assignment>>;

    /// Inserts an active assignment; `PortError::Conflict` if the student
    /// already holds an active assignment in that semester.
    async fn insert_assignment(&self, new: NewAssignment) -> PortResult<Assignment>;

    /// Flips an active assignment to inactive. Returns `false` when the row
    /// exists but was already inactive.
    async fn deactivate_assignment(&self, id: i64) -> PortResult<bool>;

    /// Deactivates `id` and inserts its replacement for `new_tutor_id` as one
    /// unit of work. Returns `(old, new)`.
    async fn replace_assignment(
        &self,
        id: i64,
        new_tutor_id: i64,
    ) -> PortResult<(Assignment, Assignment)>;

    /// Inserts a batch of active assignments atomically: either every row is
    /// written or none is.
    async fn insert_assignments(&self, batch: &[NewAssignment]) -> PortResult<Vec<Assignment>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_session(&self, id: i64) -> PortResult<Session>;

    async fn list_sessions(&self, filter: &SessionFilter) -> PortResult<Vec<Session>>;

    /// Sessions of `tutor_id` on `date` whose status still occupies the
    /// tutor's calendar and whose time range overlaps `[start, end)`.
    async fn overlapping_sessions(
        &self,
        tutor_id: i64,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude_id: Option<i64>,
    ) -> PortResult<Vec<Session>>;

    async fn insert_session(&self, new: &NewSessionRecord) -> PortResult<Session>;

    async fn update_session(&self, id: i64, update: &SessionUpdate) -> PortResult<Session>;
}

#[async_trait]
pub trait CertificateStore: Send + Sync {
    async fn get_certificate(&self, id: i64) -> PortResult<Certificate>;

    async fn find_certificate(
        &self,
        student_id: i64,
        assignment_id: i64,
        semester_id: i64,
    ) -> PortResult<Option<Certificate>>;

    async fn list_certificates(&self, filter: &CertificateFilter) -> PortResult<Vec<Certificate>>;

    /// Inserts the certificate or, when one already exists for the same
    /// student/assignment/semester, overwrites its path and generation time.
    async fn upsert_certificate(&self, record: &CertificateRecord) -> PortResult<Certificate>;

    /// Sets `signed`. Returns `false` if the certificate was already signed.
    async fn mark_signed(&self, id: i64) -> PortResult<bool>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: i64) -> PortResult<Option<UserAccount>>;

    /// Active accounts holding `role`, ordered by name.
    async fn active_users_with_role(&self, role: Role) -> PortResult<Vec<UserAccount>>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_audit(&self, entry: &NewAuditEntry) -> PortResult<AuditLogEntry>;

    async fn query_audit(
        &self,
        filter: &AuditFilter,
        page: u32,
        per_page: u32,
    ) -> PortResult<Page<AuditLogEntry>>;
}

//=========================================================================================
// External Collaborator Ports
//=========================================================================================

/// Everything a certificate document shows, fully resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateBundle {
    pub student_name: String,
    pub tutor_name: String,
    pub semester_name: String,
    pub completed: Vec<(SessionType, u32)>,
    pub issued_on: NaiveDate,
}

#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Renders the bundle into opaque document bytes.
    async fn render_certificate(&self, bundle: &CertificateBundle) -> PortResult<Bytes>;
}

#[async_trait]
pub trait DocumentStorage: Send + Sync {
    /// Persists the bytes under `name`, replacing any previous document,
    /// and returns the stored path.
    async fn store(&self, name: &str, document: Bytes) -> PortResult<String>;
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        template: &str,
        data: &serde_json::Value,
    ) -> PortResult<()>;
}

/// Source of "today" for date validation.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
