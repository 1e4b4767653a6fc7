//! crates/tutoring_core/src/domain.rs
//!
//! Defines the core data structures for the tutoring lifecycle.
//! These structs carry no database or transport concerns; the status enums
//! know their canonical text form so adapters can persist them.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

//=========================================================================================
// Status Vocabularies
//=========================================================================================
// Semester, assignment and session statuses are three independent vocabularies.
//=========================================================================================

/// Error returned when a stored status string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemesterStatus {
    Scheduled,
    Active,
    Closed,
}

text_enum!(SemesterStatus, "semester status", {
    Scheduled => "scheduled",
    Active => "active",
    Closed => "closed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Active,
    Inactive,
}

text_enum!(AssignmentStatus, "assignment status", {
    Active => "active",
    Inactive => "inactive",
});

/// The lifecycle of a single tutoring meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Rescheduled,
    InProgress,
    Completed,
    Cancelled,
}

text_enum!(SessionStatus, "session status", {
    Scheduled => "scheduled",
    Rescheduled => "rescheduled",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl SessionStatus {
    /// Completed and cancelled sessions are frozen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether a session in this state may move to `next`.
    ///
    /// `Scheduled`/`Rescheduled` may go straight to `Completed`: finalising a
    /// session that was never drafted passes through `InProgress` in one step.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (Completed | Cancelled, _) => false,
            (_, Scheduled) => false,
            (Scheduled | Rescheduled, Rescheduled) => true,
            (InProgress, Rescheduled) => false,
            (_, InProgress | Completed | Cancelled) => true,
        }
    }

    /// A slot held by a session in this state blocks the tutor's calendar.
    ///
    /// `Rescheduled` and `InProgress` sessions still hold a confirmed slot that
    /// will end as `Completed`, so only `Cancelled` releases it.
    pub fn occupies_calendar(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Academic,
    Personal,
    Professional,
}

text_enum!(SessionType, "session type", {
    Academic => "academic",
    Personal => "personal",
    Professional => "professional",
});

impl SessionType {
    pub const ALL: [SessionType; 3] = [Self::Academic, Self::Personal, Self::Professional];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    InPerson,
    Virtual,
}

text_enum!(Modality, "modality", {
    InPerson => "in_person",
    Virtual => "virtual",
});

/// The role carried by an authenticated principal and by directory accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Tutor,
    Student,
    Verifier,
}

text_enum!(Role, "role", {
    Admin => "admin",
    Tutor => "tutor",
    Student => "student",
    Verifier => "verifier",
});

//=========================================================================================
// Entities
//=========================================================================================

/// An academic term, the top-level scope for assignments and sessions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Semester {
    pub id: i64,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: SemesterStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields written when a semester is created or updated.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SemesterDraft {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: SemesterStatus,
}

/// The link between one tutor and one student for one semester.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub id: i64,
    pub tutor_id: i64,
    pub student_id: i64,
    pub semester_id: i64,
    pub assigned_at: DateTime<Utc>,
    pub status: AssignmentStatus,
    pub ended_at: Option<DateTime<Utc>>,
}

/// A row the gateway inserts as an active assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewAssignment {
    pub tutor_id: i64,
    pub student_id: i64,
    pub semester_id: i64,
}

/// One scheduled or performed tutoring meeting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub id: i64,
    pub assignment_id: i64,
    pub tutor_id: i64,
    pub student_id: i64,
    pub semester_id: i64,
    pub session_type: SessionType,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub modality: Modality,
    pub status: SessionStatus,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Half-open interval overlap against another slot on the same date.
    pub fn overlaps(&self, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> bool {
        self.date == date && self.start_time < end && self.end_time > start
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSessionRecord {
    pub assignment_id: i64,
    pub tutor_id: i64,
    pub student_id: i64,
    pub semester_id: i64,
    pub session_type: SessionType,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub modality: Modality,
    pub notes: Option<String>,
}

/// A generated document attesting all three session types were completed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Certificate {
    pub id: i64,
    pub tutor_id: i64,
    pub student_id: i64,
    pub assignment_id: i64,
    pub semester_id: i64,
    pub pdf_path: String,
    pub generated_at: DateTime<Utc>,
    pub signed: bool,
    pub signed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CertificateRecord {
    pub tutor_id: i64,
    pub student_id: i64,
    pub assignment_id: i64,
    pub semester_id: i64,
    pub pdf_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub actor_id: i64,
    pub actor_label: String,
    pub action: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub source_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub actor_id: i64,
    pub actor_label: String,
    pub action: String,
    pub description: String,
    pub source_ip: Option<String>,
}

/// A directory account. Users are managed elsewhere; the core only reads them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserAccount {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
}

impl UserAccount {
    pub fn is_active_with_role(&self, role: Role) -> bool {
        self.active && self.role == role
    }
}
