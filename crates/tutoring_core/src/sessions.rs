//! crates/tutoring_core/src/sessions.rs
//!
//! Tutoring session scheduling and its status lifecycle. Completed and
//! cancelled sessions are frozen; any further mutation is rejected.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::audit::AuditTrail;
use crate::auth::Principal;
use crate::domain::{
    AssignmentStatus, Modality, NewSessionRecord, Role, Session, SessionStatus, SessionType,
};
use crate::error::{require_text, ServiceError, ServiceResult};
use crate::ports::{
    AssignmentStore, Clock, SemesterStore, SessionFilter, SessionStore, SessionUpdate,
};

//=========================================================================================
// Session Forms
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcademicForm {
    pub subject: Option<String>,
    pub topics: Option<String>,
    pub difficulties: Option<String>,
    pub agreements: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalForm {
    pub topic: Option<String>,
    pub observations: Option<String>,
    pub follow_up: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfessionalForm {
    pub area: Option<String>,
    pub activities: Option<String>,
    pub goals: Option<String>,
    pub observations: Option<String>,
}

/// The type-specific record a tutor fills in for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionForm {
    Academic(AcademicForm),
    Personal(PersonalForm),
    Professional(ProfessionalForm),
}

impl SessionForm {
    pub fn session_type(&self) -> SessionType {
        match self {
            SessionForm::Academic(_) => SessionType::Academic,
            SessionForm::Personal(_) => SessionType::Personal,
            SessionForm::Professional(_) => SessionType::Professional,
        }
    }

    /// Names of the required fields that are missing or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let required: Vec<(&'static str, &Option<String>)> = match self {
            SessionForm::Academic(f) => vec![
                ("subject", &f.subject),
                ("topics", &f.topics),
                ("agreements", &f.agreements),
            ],
            SessionForm::Personal(f) => {
                vec![("topic", &f.topic), ("observations", &f.observations)]
            }
            SessionForm::Professional(f) => vec![
                ("area", &f.area),
                ("activities", &f.activities),
                ("goals", &f.goals),
            ],
        };
        required
            .into_iter()
            .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
            .map(|(name, _)| name)
            .collect()
    }
}

//=========================================================================================
// Requests
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub assignment_id: i64,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub session_type: SessionType,
    pub modality: Modality,
    pub notes: Option<String>,
}

//=========================================================================================
// Tracker
//=========================================================================================

#[derive(Clone)]
pub struct SessionTracker {
    sessions: Arc<dyn SessionStore>,
    assignments: Arc<dyn AssignmentStore>,
    semesters: Arc<dyn SemesterStore>,
    clock: Arc<dyn Clock>,
    audit: AuditTrail,
}

impl SessionTracker {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        assignments: Arc<dyn AssignmentStore>,
        semesters: Arc<dyn SemesterStore>,
        clock: Arc<dyn Clock>,
        audit: AuditTrail,
    ) -> Self {
        Self {
            sessions,
            assignments,
            semesters,
            clock,
            audit,
        }
    }

    pub async fn get(&self, principal: &Principal, id: i64) -> ServiceResult<Session> {
        let session = self.sessions.get_session(id).await?;
        match principal.role {
            Role::Admin | Role::Verifier => {}
            Role::Tutor if session.tutor_id == principal.user_id => {}
            Role::Student if session.student_id == principal.user_id => {}
            _ => {
                return Err(ServiceError::Forbidden(
                    "session belongs to another user".to_string(),
                ))
            }
        }
        Ok(session)
    }

    pub async fn list(
        &self,
        principal: &Principal,
        mut filter: SessionFilter,
    ) -> ServiceResult<Vec<Session>> {
        match principal.role {
            Role::Admin | Role::Verifier => {}
            Role::Tutor => filter.tutor_id = Some(principal.user_id),
            Role::Student => filter.student_id = Some(principal.user_id),
        }
        Ok(self.sessions.list_sessions(&filter).await?)
    }

    pub async fn create(&self, principal: &Principal, new: NewSession) -> ServiceResult<Session> {
        principal.require(Role::Tutor)?;
        let semester = self.semesters.active_semester().await?.ok_or_else(|| {
            ServiceError::NotFound("There is no active semester".to_string())
        })?;

        let assignment = self.assignments.get_assignment(new.assignment_id).await?;
        if assignment.tutor_id != principal.user_id {
            return Err(ServiceError::Forbidden(
                "assignment belongs to another tutor".to_string(),
            ));
        }
        if assignment.status != AssignmentStatus::Active {
            return Err(ServiceError::Validation(format!(
                "Assignment {} is not active",
                assignment.id
            )));
        }
        if assignment.semester_id != semester.id {
            return Err(ServiceError::Validation(format!(
                "Assignment {} does not belong to the active semester",
                assignment.id
            )));
        }
        self.check_slot(
            assignment.tutor_id,
            new.date,
            new.start_time,
            new.end_time,
            None,
        )
        .await?;

        let session = self
            .sessions
            .insert_session(&NewSessionRecord {
                assignment_id: assignment.id,
                tutor_id: assignment.tutor_id,
                student_id: assignment.student_id,
                semester_id: assignment.semester_id,
                session_type: new.session_type,
                date: new.date,
                start_time: new.start_time,
                end_time: new.end_time,
                modality: new.modality,
                notes: new.notes.filter(|n| !n.trim().is_empty()),
            })
            .await?;
        info!(session_id = session.id, assignment_id = assignment.id, "Session scheduled");
        self.audit
            .record(
                principal,
                "session.create",
                format!(
                    "Scheduled {} session {} for student {} on {} {}-{}",
                    session.session_type,
                    session.id,
                    session.student_id,
                    session.date,
                    session.start_time,
                    session.end_time
                ),
            )
            .await;
        Ok(session)
    }

    pub async fn reschedule(
        &self,
        principal: &Principal,
        id: i64,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> ServiceResult<Session> {
        let session = self.owned_session(principal, id).await?;
        ensure_transition(&session, SessionStatus::Rescheduled)?;
        self.check_slot(session.tutor_id, date, start_time, end_time, Some(id))
            .await?;

        let mut update = SessionUpdate::from(&session);
        update.date = date;
        update.start_time = start_time;
        update.end_time = end_time;
        update.status = SessionStatus::Rescheduled;

        let updated = self.sessions.update_session(id, &update).await?;
        info!(session_id = id, "Session rescheduled");
        self.audit
            .record(
                principal,
                "session.reschedule",
                format!(
                    "Rescheduled session {} to {} {}-{}",
                    id, date, start_time, end_time
                ),
            )
            .await;
        Ok(updated)
    }

    /// Stores a partially filled form and marks the session in progress.
    pub async fn save_draft(
        &self,
        principal: &Principal,
        id: i64,
        form: SessionForm,
    ) -> ServiceResult<Session> {
        let session = self.owned_session(principal, id).await?;
        ensure_transition(&session, SessionStatus::InProgress)?;
        ensure_form_type(&session, &form)?;

        let mut update = SessionUpdate::from(&session);
        update.notes = Some(encode_form(&form)?);
        update.status = SessionStatus::InProgress;

        let updated = self.sessions.update_session(id, &update).await?;
        self.audit
            .record(principal, "session.draft", format!("Saved draft of session {}", id))
            .await;
        Ok(updated)
    }

    /// Completes the session. Every required field of its form must be filled.
    pub async fn finalize(
        &self,
        principal: &Principal,
        id: i64,
        form: SessionForm,
    ) -> ServiceResult<Session> {
        let session = self.owned_session(principal, id).await?;
        ensure_transition(&session, SessionStatus::Completed)?;
        ensure_form_type(&session, &form)?;
        let missing = form.missing_fields();
        if !missing.is_empty() {
            return Err(ServiceError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let mut update = SessionUpdate::from(&session);
        update.notes = Some(encode_form(&form)?);
        update.status = SessionStatus::Completed;
        update.completed_at = Some(self.clock.now());

        let updated = self.sessions.update_session(id, &update).await?;
        info!(session_id = id, session_type = %updated.session_type, "Session completed");
        self.audit
            .record(
                principal,
                "session.finalize",
                format!(
                    "Completed {} session {} for student {}",
                    updated.session_type, id, updated.student_id
                ),
            )
            .await;
        Ok(updated)
    }

    pub async fn cancel(
        &self,
        principal: &Principal,
        id: i64,
        reason: &str,
    ) -> ServiceResult<Session> {
        require_text("reason", reason)?;
        let session = self.owned_session(principal, id).await?;
        ensure_transition(&session, SessionStatus::Cancelled)?;

        let mut update = SessionUpdate::from(&session);
        update.status = SessionStatus::Cancelled;
        update.cancellation_reason = Some(reason.trim().to_string());
        update.cancelled_at = Some(self.clock.now());

        let updated = self.sessions.update_session(id, &update).await?;
        info!(session_id = id, "Session cancelled");
        self.audit
            .record(
                principal,
                "session.cancel",
                format!("Cancelled session {}: {}", id, reason.trim()),
            )
            .await;
        Ok(updated)
    }

    async fn owned_session(&self, principal: &Principal, id: i64) -> ServiceResult<Session> {
        principal.require(Role::Tutor)?;
        let session = self.sessions.get_session(id).await?;
        if session.tutor_id != principal.user_id {
            return Err(ServiceError::Forbidden(
                "session belongs to another tutor".to_string(),
            ));
        }
        Ok(session)
    }

    async fn check_slot(
        &self,
        tutor_id: i64,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude: Option<i64>,
    ) -> ServiceResult<()> {
        if start >= end {
            return Err(ServiceError::Validation(
                "start_time must be before end_time".to_string(),
            ));
        }
        if date < self.clock.today() {
            return Err(ServiceError::Validation(
                "Sessions cannot be scheduled in the past".to_string(),
            ));
        }
        let clashes = self
            .sessions
            .overlapping_sessions(tutor_id, date, start, end, exclude)
            .await?;
        if let Some(clash) = clashes.first() {
            return Err(ServiceError::Conflict(format!(
                "The tutor already has session {} from {} to {} on {}",
                clash.id, clash.start_time, clash.end_time, clash.date
            )));
        }
        Ok(())
    }
}

fn ensure_transition(session: &Session, next: SessionStatus) -> ServiceResult<()> {
    if session.status.is_terminal() {
        return Err(ServiceError::Validation(format!(
            "Session {} is {} and can no longer be modified",
            session.id, session.status
        )));
    }
    if !session.status.can_transition_to(next) {
        return Err(ServiceError::Validation(format!(
            "Session {} cannot move from {} to {}",
            session.id, session.status, next
        )));
    }
    Ok(())
}

fn ensure_form_type(session: &Session, form: &SessionForm) -> ServiceResult<()> {
    if form.session_type() != session.session_type {
        return Err(ServiceError::Validation(format!(
            "Session {} is {}, but a {} form was submitted",
            session.id,
            session.session_type,
            form.session_type()
        )));
    }
    Ok(())
}

fn encode_form(form: &SessionForm) -> ServiceResult<String> {
    serde_json::to_string(form).map_err(|e| ServiceError::Validation(e.to_string()))
}
