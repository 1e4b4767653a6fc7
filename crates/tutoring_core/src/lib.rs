pub mod assignments;
pub mod audit;
pub mod auth;
pub mod certificates;
pub mod domain;
pub mod error;
pub mod memory;
mod notify;
pub mod ports;
pub mod reports;
pub mod semesters;
pub mod sessions;

pub use assignments::{AssignmentManager, AutoAssignOutcome, TutorLoad};
pub use audit::{AuditQuery, AuditTrail};
pub use auth::Principal;
pub use certificates::{CertificateOutputs, CertificateService};
pub use domain::{
    Assignment, AssignmentStatus, AuditLogEntry, Certificate, Modality, Role, Semester,
    SemesterDraft, SemesterStatus, Session, SessionStatus, SessionType, UserAccount,
};
pub use error::{ServiceError, ServiceResult};
pub use ports::{PortError, PortResult};
pub use reports::{ReportService, TutorCompliance};
pub use semesters::SemesterManager;
pub use sessions::{NewSession, SessionForm, SessionTracker};
