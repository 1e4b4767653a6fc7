//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the PostgreSQL implementation of
//! the persistence gateway ports from the `tutoring_core` crate. Operations that
//! must keep an invariant across several rows run inside a single transaction;
//! a transaction that is dropped before `commit` rolls back.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tutoring_core::domain::{
    Assignment, AssignmentStatus, AuditLogEntry, Certificate, CertificateRecord, NewAssignment,
    NewAuditEntry, NewSessionRecord, Role, Semester, SemesterDraft, SemesterStatus, Session,
    UnknownVariant, UserAccount,
};
use tutoring_core::ports::{
    AssignmentFilter, AssignmentStore, AuditFilter, AuditStore, CertificateFilter,
    CertificateStore, Page, PortError, PortResult, SemesterStore, SessionFilter, SessionStore,
    SessionUpdate, UserDirectory,
};

// Column lists shared by every query returning a given record.
macro_rules! semester_columns {
    () => {
        "id, name, start_date, end_date, status, created_at"
    };
}
macro_rules! assignment_columns {
    () => {
        "id, tutor_id, student_id, semester_id, assigned_at, status, ended_at"
    };
}
macro_rules! session_columns {
    () => {
        "id, assignment_id, tutor_id, student_id, semester_id, session_type, date, start_time, \
         end_time, modality, status, notes, completed_at, cancellation_reason, cancelled_at, \
         created_at"
    };
}
macro_rules! certificate_columns {
    () => {
        "id, tutor_id, student_id, assignment_id, semester_id, pdf_path, generated_at, signed, \
         signed_at"
    };
}
macro_rules! audit_columns {
    () => {
        "id, actor_id, actor_label, action, description, timestamp, source_ip"
    };
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every store port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

const UNIQUE_VIOLATION: &str = "23505";

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Maps a unique-index violation to `Conflict` with the given message.
fn conflict_or_unexpected(e: sqlx::Error, message: impl FnOnce() -> String) -> PortError {
    let is_unique_violation = e
        .as_database_error()
        .and_then(|db| db.code())
        .map_or(false, |code| code == UNIQUE_VIOLATION);
    if is_unique_violation {
        PortError::Conflict(message())
    } else {
        unexpected(e)
    }
}

fn not_found_or_unexpected(e: sqlx::Error, what: &str, id: i64) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} {} not found", what, id)),
        _ => unexpected(e),
    }
}

fn parse_text<T>(value: &str) -> PortResult<T>
where
    T: FromStr<Err = UnknownVariant>,
{
    value
        .parse()
        .map_err(|e: UnknownVariant| PortError::Unexpected(e.to_string()))
}

fn active_assignment_conflict(student_id: i64, semester_id: i64) -> String {
    format!(
        "Student {} already has an active assignment in semester {}",
        student_id, semester_id
    )
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SemesterRecord {
    id: i64,
    name: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    status: String,
    created_at: DateTime<Utc>,
}
impl SemesterRecord {
    fn to_domain(self) -> PortResult<Semester> {
        Ok(Semester {
            id: self.id,
            name: self.name,
            start_date: self.start_date,
            end_date: self.end_date,
            status: parse_text(&self.status)?,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct AssignmentRecord {
    id: i64,
    tutor_id: i64,
    student_id: i64,
    semester_id: i64,
    assigned_at: DateTime<Utc>,
    status: String,
    ended_at: Option<DateTime<Utc>>,
}
impl AssignmentRecord {
    fn to_domain(self) -> PortResult<Assignment> {
        Ok(Assignment {
            id: self.id,
            tutor_id: self.tutor_id,
            student_id: self.student_id,
            semester_id: self.semester_id,
            assigned_at: self.assigned_at,
            status: parse_text(&self.status)?,
            ended_at: self.ended_at,
        })
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: i64,
    assignment_id: i64,
    tutor_id: i64,
    student_id: i64,
    semester_id: i64,
    session_type: String,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    modality: String,
    status: String,
    notes: Option<String>,
    completed_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self) -> PortResult<Session> {
        Ok(Session {
            id: self.id,
            assignment_id: self.assignment_id,
            tutor_id: self.tutor_id,
            student_id: self.student_id,
            semester_id: self.semester_id,
            session_type: parse_text(&self.session_type)?,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            modality: parse_text(&self.modality)?,
            status: parse_text(&self.status)?,
            notes: self.notes,
            completed_at: self.completed_at,
            cancellation_reason: self.cancellation_reason,
            cancelled_at: self.cancelled_at,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct CertificateRow {
    id: i64,
    tutor_id: i64,
    student_id: i64,
    assignment_id: i64,
    semester_id: i64,
    pdf_path: String,
    generated_at: DateTime<Utc>,
    signed: bool,
    signed_at: Option<DateTime<Utc>>,
}
impl CertificateRow {
    fn to_domain(self) -> Certificate {
        Certificate {
            id: self.id,
            tutor_id: self.tutor_id,
            student_id: self.student_id,
            assignment_id: self.assignment_id,
            semester_id: self.semester_id,
            pdf_path: self.pdf_path,
            generated_at: self.generated_at,
            signed: self.signed,
            signed_at: self.signed_at,
        }
    }
}

#[derive(FromRow)]
struct UserRecord {
    id: i64,
    full_name: String,
    email: String,
    role: String,
    active: bool,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<UserAccount> {
        Ok(UserAccount {
            id: self.id,
            full_name: self.full_name,
            email: self.email,
            role: parse_text(&self.role)?,
            active: self.active,
        })
    }
}

#[derive(FromRow)]
struct AuditRecord {
    id: i64,
    actor_id: i64,
    actor_label: String,
    action: String,
    description: String,
    timestamp: DateTime<Utc>,
    source_ip: Option<String>,
}
impl AuditRecord {
    fn to_domain(self) -> AuditLogEntry {
        AuditLogEntry {
            id: self.id,
            actor_id: self.actor_id,
            actor_label: self.actor_label,
            action: self.action,
            description: self.description,
            timestamp: self.timestamp,
            source_ip: self.source_ip,
        }
    }
}

//=========================================================================================
// `SemesterStore` Implementation
//=========================================================================================

#[async_trait]
impl SemesterStore for DbAdapter {
    async fn list_semesters(&self) -> PortResult<Vec<Semester>> {
        sqlx::query_as::<_, SemesterRecord>(concat!(
            "SELECT ",
            semester_columns!(),
            " FROM semesters ORDER BY start_date DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(SemesterRecord::to_domain)
        .collect()
    }

    async fn get_semester(&self, id: i64) -> PortResult<Semester> {
        sqlx::query_as::<_, SemesterRecord>(concat!(
            "SELECT ",
            semester_columns!(),
            " FROM semesters WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, "Semester", id))?
        .to_domain()
    }

    async fn active_semester(&self) -> PortResult<Option<Semester>> {
        sqlx::query_as::<_, SemesterRecord>(concat!(
            "SELECT ",
            semester_columns!(),
            " FROM semesters WHERE status = 'active'"
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .map(SemesterRecord::to_domain)
        .transpose()
    }

    async fn insert_semester(&self, draft: &SemesterDraft) -> PortResult<Semester> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        if draft.status == SemesterStatus::Active {
            sqlx::query("UPDATE semesters SET status = 'closed' WHERE status = 'active'")
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
        }
        let record = sqlx::query_as::<_, SemesterRecord>(concat!(
            "INSERT INTO semesters (name, start_date, end_date, status) VALUES ($1, $2, $3, $4) \
             RETURNING ",
            semester_columns!()
        ))
        .bind(&draft.name)
        .bind(draft.start_date)
        .bind(draft.end_date)
        .bind(draft.status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_or_unexpected(e, || "Another semester is already active".into()))?;
        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }

    async fn update_semester(&self, id: i64, draft: &SemesterDraft) -> PortResult<Semester> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query("SELECT id FROM semesters WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| not_found_or_unexpected(e, "Semester", id))?;
        if draft.status == SemesterStatus::Active {
            sqlx::query(
                "UPDATE semesters SET status = 'closed' WHERE status = 'active' AND id <> $1",
            )
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }
        let record = sqlx::query_as::<_, SemesterRecord>(concat!(
            "UPDATE semesters SET name = $2, start_date = $3, end_date = $4, status = $5 \
             WHERE id = $1 RETURNING ",
            semester_columns!()
        ))
        .bind(id)
        .bind(&draft.name)
        .bind(draft.start_date)
        .bind(draft.end_date)
        .bind(draft.status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_or_unexpected(e, || "Another semester is already active".into()))?;
        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }

    async fn close_semester(&self, id: i64) -> PortResult<u64> {
        let result =
            sqlx::query("UPDATE semesters SET status = 'closed' WHERE id = $1 AND status <> 'closed'")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(unexpected)?;
        Ok(result.rows_affected())
    }
}

//=========================================================================================
// `AssignmentStore` Implementation
//=========================================================================================

async fn insert_active_assignment<'c, E>(executor: E, new: NewAssignment) -> PortResult<Assignment>
where
    E: sqlx::Executor<'c, Database = sqlx::Postgres>,
{
    sqlx::query_as::<_, AssignmentRecord>(concat!(
        "INSERT INTO assignments (tutor_id, student_id, semester_id, status) \
         VALUES ($1, $2, $3, 'active') RETURNING ",
        assignment_columns!()
    ))
    .bind(new.tutor_id)
    .bind(new.student_id)
    .bind(new.semester_id)
    .fetch_one(executor)
    .await
    .map_err(|e| {
        conflict_or_unexpected(e, || {
            active_assignment_conflict(new.student_id, new.semester_id)
        })
    })?
    .to_domain()
}

#[async_trait]
impl AssignmentStore for DbAdapter {
    async fn get_assignment(&self, id: i64) -> PortResult<Assignment> {
        sqlx::query_as::<_, AssignmentRecord>(concat!(
            "SELECT ",
            assignment_columns!(),
            " FROM assignments WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, "Assignment", id))?
        .to_domain()
    }

    async fn list_assignments(&self, filter: &AssignmentFilter) -> PortResult<Vec<Assignment>> {
        sqlx::query_as::<_, AssignmentRecord>(concat!(
            "SELECT ",
            assignment_columns!(),
            " FROM assignments \
             WHERE ($1::BIGINT IS NULL OR semester_id = $1) \
               AND ($2::BIGINT IS NULL OR tutor_id = $2) \
               AND ($3::BIGINT IS NULL OR student_id = $3) \
               AND ($4::TEXT IS NULL OR status = $4) \
             ORDER BY assigned_at, id"
        ))
        .bind(filter.semester_id)
        .bind(filter.tutor_id)
        .bind(filter.student_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(AssignmentRecord::to_domain)
        .collect()
    }

    async fn active_assignment_for(
        &self,
        student_id: i64,
        semester_id: i64,
    ) -> PortResult<Option<Assignment>> {
        sqlx::query_as::<_, AssignmentRecord>(concat!(
            "SELECT ",
            assignment_columns!(),
            " FROM assignments WHERE student_id = $1 AND semester_id = $2 AND status = 'active'"
        ))
        .bind(student_id)
        .bind(semester_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .map(AssignmentRecord::to_domain)
        .transpose()
    }

    async fn insert_assignment(&self, new: NewAssignment) -> PortResult<Assignment> {
        insert_active_assignment(&self.pool, new).await
    }

    async fn deactivate_assignment(&self, id: i64) -> PortResult<bool> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let record = sqlx::query_as::<_, AssignmentRecord>(concat!(
            "SELECT ",
            assignment_columns!(),
            " FROM assignments WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| not_found_or_unexpected(e, "Assignment", id))?;
        if parse_text::<AssignmentStatus>(&record.status)? == AssignmentStatus::Inactive {
            return Ok(false);
        }
        sqlx::query("UPDATE assignments SET status = 'inactive', ended_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;
        Ok(true)
    }

    async fn replace_assignment(
        &self,
        id: i64,
        new_tutor_id: i64,
    ) -> PortResult<(Assignment, Assignment)> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let locked = sqlx::query_as::<_, AssignmentRecord>(concat!(
            "SELECT ",
            assignment_columns!(),
            " FROM assignments WHERE id = $1 AND status = 'active' FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Active assignment {} not found", id)))?;

        let old = sqlx::query_as::<_, AssignmentRecord>(concat!(
            "UPDATE assignments SET status = 'inactive', ended_at = NOW() WHERE id = $1 \
             RETURNING ",
            assignment_columns!()
        ))
        .bind(locked.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?
        .to_domain()?;

        let new = insert_active_assignment(
            &mut *tx,
            NewAssignment {
                tutor_id: new_tutor_id,
                student_id: old.student_id,
                semester_id: old.semester_id,
            },
        )
        .await?;
        tx.commit().await.map_err(unexpected)?;
        Ok((old, new))
    }

    async fn insert_assignments(&self, batch: &[NewAssignment]) -> PortResult<Vec<Assignment>> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let mut inserted = Vec::with_capacity(batch.len());
        for new in batch {
            // An error returns early and the dropped transaction rolls back.
            inserted.push(insert_active_assignment(&mut *tx, *new).await?);
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(inserted)
    }
}

//=========================================================================================
// `SessionStore` Implementation
//=========================================================================================

#[async_trait]
impl SessionStore for DbAdapter {
    async fn get_session(&self, id: i64) -> PortResult<Session> {
        sqlx::query_as::<_, SessionRecord>(concat!(
            "SELECT ",
            session_columns!(),
            " FROM sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, "Session", id))?
        .to_domain()
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> PortResult<Vec<Session>> {
        sqlx::query_as::<_, SessionRecord>(concat!(
            "SELECT ",
            session_columns!(),
            " FROM sessions \
             WHERE ($1::BIGINT IS NULL OR tutor_id = $1) \
               AND ($2::BIGINT IS NULL OR student_id = $2) \
               AND ($3::BIGINT IS NULL OR semester_id = $3) \
               AND ($4::TEXT IS NULL OR status = $4) \
               AND ($5::TEXT IS NULL OR session_type = $5) \
             ORDER BY date, start_time, id"
        ))
        .bind(filter.tutor_id)
        .bind(filter.student_id)
        .bind(filter.semester_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.session_type.map(|t| t.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(SessionRecord::to_domain)
        .collect()
    }

    async fn overlapping_sessions(
        &self,
        tutor_id: i64,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude_id: Option<i64>,
    ) -> PortResult<Vec<Session>> {
        sqlx::query_as::<_, SessionRecord>(concat!(
            "SELECT ",
            session_columns!(),
            " FROM sessions \
             WHERE tutor_id = $1 AND date = $2 AND start_time < $4 AND end_time > $3 \
               AND status <> 'cancelled' \
               AND ($5::BIGINT IS NULL OR id <> $5)"
        ))
        .bind(tutor_id)
        .bind(date)
        .bind(start)
        .bind(end)
        .bind(exclude_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(SessionRecord::to_domain)
        .collect()
    }

    async fn insert_session(&self, new: &NewSessionRecord) -> PortResult<Session> {
        sqlx::query_as::<_, SessionRecord>(concat!(
            "INSERT INTO sessions (assignment_id, tutor_id, student_id, semester_id, \
             session_type, date, start_time, end_time, modality, status, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'scheduled', $10) RETURNING ",
            session_columns!()
        ))
        .bind(new.assignment_id)
        .bind(new.tutor_id)
        .bind(new.student_id)
        .bind(new.semester_id)
        .bind(new.session_type.as_str())
        .bind(new.date)
        .bind(new.start_time)
        .bind(new.end_time)
        .bind(new.modality.as_str())
        .bind(new.notes.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?
        .to_domain()
    }

    async fn update_session(&self, id: i64, update: &SessionUpdate) -> PortResult<Session> {
        sqlx::query_as::<_, SessionRecord>(concat!(
            "UPDATE sessions SET date = $2, start_time = $3, end_time = $4, status = $5, \
             notes = $6, completed_at = $7, cancellation_reason = $8, cancelled_at = $9 \
             WHERE id = $1 RETURNING ",
            session_columns!()
        ))
        .bind(id)
        .bind(update.date)
        .bind(update.start_time)
        .bind(update.end_time)
        .bind(update.status.as_str())
        .bind(update.notes.as_deref())
        .bind(update.completed_at)
        .bind(update.cancellation_reason.as_deref())
        .bind(update.cancelled_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, "Session", id))?
        .to_domain()
    }
}

//=========================================================================================
// `CertificateStore` Implementation
//=========================================================================================

#[async_trait]
impl CertificateStore for DbAdapter {
    async fn get_certificate(&self, id: i64) -> PortResult<Certificate> {
        let row = sqlx::query_as::<_, CertificateRow>(concat!(
            "SELECT ",
            certificate_columns!(),
            " FROM certificates WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, "Certificate", id))?;
        Ok(row.to_domain())
    }

    async fn find_certificate(
        &self,
        student_id: i64,
        assignment_id: i64,
        semester_id: i64,
    ) -> PortResult<Option<Certificate>> {
        let row = sqlx::query_as::<_, CertificateRow>(concat!(
            "SELECT ",
            certificate_columns!(),
            " FROM certificates WHERE student_id = $1 AND assignment_id = $2 AND semester_id = $3"
        ))
        .bind(student_id)
        .bind(assignment_id)
        .bind(semester_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(row.map(CertificateRow::to_domain))
    }

    async fn list_certificates(&self, filter: &CertificateFilter) -> PortResult<Vec<Certificate>> {
        let rows = sqlx::query_as::<_, CertificateRow>(concat!(
            "SELECT ",
            certificate_columns!(),
            " FROM certificates \
             WHERE ($1::BIGINT IS NULL OR semester_id = $1) \
               AND ($2::BIGINT IS NULL OR student_id = $2) \
               AND ($3::BIGINT IS NULL OR tutor_id = $3) \
             ORDER BY generated_at DESC, id DESC"
        ))
        .bind(filter.semester_id)
        .bind(filter.student_id)
        .bind(filter.tutor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(rows.into_iter().map(CertificateRow::to_domain).collect())
    }

    async fn upsert_certificate(&self, record: &CertificateRecord) -> PortResult<Certificate> {
        let row = sqlx::query_as::<_, CertificateRow>(concat!(
            "INSERT INTO certificates (tutor_id, student_id, assignment_id, semester_id, pdf_path) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (student_id, assignment_id, semester_id) \
             DO UPDATE SET pdf_path = EXCLUDED.pdf_path, generated_at = NOW() \
             RETURNING ",
            certificate_columns!()
        ))
        .bind(record.tutor_id)
        .bind(record.student_id)
        .bind(record.assignment_id)
        .bind(record.semester_id)
        .bind(&record.pdf_path)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(row.to_domain())
    }

    async fn mark_signed(&self, id: i64) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE certificates SET signed = TRUE, signed_at = NOW() WHERE id = $1 AND NOT signed",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 1 {
            return Ok(true);
        }
        // Distinguish "already signed" from "no such certificate".
        self.get_certificate(id).await?;
        Ok(false)
    }
}

//=========================================================================================
// `UserDirectory` Implementation
//=========================================================================================

#[async_trait]
impl UserDirectory for DbAdapter {
    async fn find_user(&self, id: i64) -> PortResult<Option<UserAccount>> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT id, full_name, email, role, active FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .map(UserRecord::to_domain)
        .transpose()
    }

    async fn active_users_with_role(&self, role: Role) -> PortResult<Vec<UserAccount>> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT id, full_name, email, role, active FROM users \
             WHERE role = $1 AND active ORDER BY full_name, id",
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(UserRecord::to_domain)
        .collect()
    }
}

//=========================================================================================
// `AuditStore` Implementation
//=========================================================================================

#[async_trait]
impl AuditStore for DbAdapter {
    async fn append_audit(&self, entry: &NewAuditEntry) -> PortResult<AuditLogEntry> {
        let record = sqlx::query_as::<_, AuditRecord>(concat!(
            "INSERT INTO audit_log (actor_id, actor_label, action, description, source_ip) \
             VALUES ($1, $2, $3, $4, $5) RETURNING ",
            audit_columns!()
        ))
        .bind(entry.actor_id)
        .bind(&entry.actor_label)
        .bind(&entry.action)
        .bind(&entry.description)
        .bind(entry.source_ip.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn query_audit(
        &self,
        filter: &AuditFilter,
        page: u32,
        per_page: u32,
    ) -> PortResult<Page<AuditLogEntry>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM audit_log \
             WHERE ($1::BIGINT IS NULL OR actor_id = $1) AND ($2::TEXT IS NULL OR action = $2)",
        )
        .bind(filter.actor_id)
        .bind(filter.action.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        let offset = i64::from(page.saturating_sub(1)) * i64::from(per_page);
        let records = sqlx::query_as::<_, AuditRecord>(concat!(
            "SELECT ",
            audit_columns!(),
            " FROM audit_log \
             WHERE ($1::BIGINT IS NULL OR actor_id = $1) AND ($2::TEXT IS NULL OR action = $2) \
             ORDER BY timestamp DESC, id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(filter.actor_id)
        .bind(filter.action.as_deref())
        .bind(i64::from(per_page))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(Page {
            items: records.into_iter().map(AuditRecord::to_domain).collect(),
            page,
            per_page,
            total: total.max(0) as u64,
        })
    }
}
