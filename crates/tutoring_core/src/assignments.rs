//! crates/tutoring_core/src/assignments.rs
//!
//! Tutor/student links scoped to one semester. Rows are never deleted:
//! unassigning flips a row to inactive and reassigning adds a new active row,
//! so the history of who tutored whom survives for reporting.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::info;

use crate::audit::AuditTrail;
use crate::auth::Principal;
use crate::domain::{
    Assignment, AssignmentStatus, NewAssignment, Role, Semester, SemesterStatus, UserAccount,
};
use crate::error::{ServiceError, ServiceResult};
use crate::notify::notify;
use crate::ports::{AssignmentFilter, AssignmentStore, Mailer, SemesterStore, UserDirectory};

/// How many students each tutor received from an auto-assign run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TutorLoad {
    pub tutor_id: i64,
    pub assigned: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutoAssignOutcome {
    pub assignments: Vec<Assignment>,
    pub per_tutor: Vec<TutorLoad>,
}

/// Shuffles `tutors` once and deals `students` over it round-robin.
///
/// Every tutor ends up within one student of `students.len() / tutors.len()`;
/// the shuffle decides which tutors take the remainder.
pub fn distribute<R: Rng + ?Sized>(
    students: &[i64],
    tutors: &[i64],
    rng: &mut R,
) -> Vec<(i64, i64)> {
    if tutors.is_empty() {
        return Vec::new();
    }
    let mut pool = tutors.to_vec();
    pool.shuffle(rng);
    students
        .iter()
        .enumerate()
        .map(|(i, student)| (pool[i % pool.len()], *student))
        .collect()
}

#[derive(Clone)]
pub struct AssignmentManager {
    assignments: Arc<dyn AssignmentStore>,
    semesters: Arc<dyn SemesterStore>,
    users: Arc<dyn UserDirectory>,
    mailer: Arc<dyn Mailer>,
    audit: AuditTrail,
}

impl AssignmentManager {
    pub fn new(
        assignments: Arc<dyn AssignmentStore>,
        semesters: Arc<dyn SemesterStore>,
        users: Arc<dyn UserDirectory>,
        mailer: Arc<dyn Mailer>,
        audit: AuditTrail,
    ) -> Self {
        Self {
            assignments,
            semesters,
            users,
            mailer,
            audit,
        }
    }

    pub async fn get(&self, principal: &Principal, id: i64) -> ServiceResult<Assignment> {
        let assignment = self.assignments.get_assignment(id).await?;
        match principal.role {
            Role::Admin | Role::Verifier => {}
            Role::Tutor if assignment.tutor_id == principal.user_id => {}
            Role::Student if assignment.student_id == principal.user_id => {}
            _ => {
                return Err(ServiceError::Forbidden(
                    "assignment belongs to another user".to_string(),
                ))
            }
        }
        Ok(assignment)
    }

    /// Lists assignments. Tutors and students only ever see their own rows.
    pub async fn list(
        &self,
        principal: &Principal,
        mut filter: AssignmentFilter,
    ) -> ServiceResult<Vec<Assignment>> {
        match principal.role {
            Role::Admin | Role::Verifier => {}
            Role::Tutor => filter.tutor_id = Some(principal.user_id),
            Role::Student => filter.student_id = Some(principal.user_id),
        }
        Ok(self.assignments.list_assignments(&filter).await?)
    }

    /// Active students without an active assignment in the semester, by name.
    pub async fn unassigned(
        &self,
        principal: &Principal,
        semester_id: i64,
    ) -> ServiceResult<Vec<UserAccount>> {
        principal.require(Role::Admin)?;
        self.semesters.get_semester(semester_id).await?;
        self.unassigned_students(semester_id).await
    }

    pub async fn assign(
        &self,
        principal: &Principal,
        tutor_id: i64,
        student_id: i64,
        semester_id: Option<i64>,
    ) -> ServiceResult<Assignment> {
        principal.require(Role::Admin)?;
        let semester = self.target_semester(semester_id).await?;
        self.require_user(tutor_id, Role::Tutor).await?;
        let student = self.require_user(student_id, Role::Student).await?;

        if self
            .assignments
            .active_assignment_for(student_id, semester.id)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!(
                "Student {} already has an active assignment in semester {}",
                student_id, semester.id
            )));
        }

        let assignment = self
            .assignments
            .insert_assignment(NewAssignment {
                tutor_id,
                student_id,
                semester_id: semester.id,
            })
            .await?;
        info!(
            assignment_id = assignment.id,
            tutor_id, student_id, semester_id = semester.id, "Student assigned"
        );
        self.audit
            .record(
                principal,
                "assignment.assign",
                format!(
                    "Assigned student {} to tutor {} in semester {}",
                    student_id, tutor_id, semester.id
                ),
            )
            .await;
        notify(
            self.mailer.as_ref(),
            &student,
            "assignment_created",
            json!({ "tutor_id": tutor_id, "semester": semester.name }),
        )
        .await;
        Ok(assignment)
    }

    pub async fn unassign(&self, principal: &Principal, id: i64) -> ServiceResult<Assignment> {
        principal.require(Role::Admin)?;
        if !self.assignments.deactivate_assignment(id).await? {
            return Err(ServiceError::Validation(format!(
                "Assignment {} is already inactive",
                id
            )));
        }
        let assignment = self.assignments.get_assignment(id).await?;
        info!(assignment_id = id, "Student unassigned");
        self.audit
            .record(
                principal,
                "assignment.unassign",
                format!(
                    "Ended assignment {} (tutor {}, student {})",
                    id, assignment.tutor_id, assignment.student_id
                ),
            )
            .await;
        Ok(assignment)
    }

    /// Moves a student to another tutor. Returns `(old, new)`.
    pub async fn reassign(
        &self,
        principal: &Principal,
        id: i64,
        new_tutor_id: i64,
    ) -> ServiceResult<(Assignment, Assignment)> {
        principal.require(Role::Admin)?;
        let current = self.assignments.get_assignment(id).await?;
        if current.status != AssignmentStatus::Active {
            return Err(ServiceError::Validation(format!(
                "Assignment {} is not active",
                id
            )));
        }
        if current.tutor_id == new_tutor_id {
            return Err(ServiceError::Validation(
                "The student is already assigned to that tutor".to_string(),
            ));
        }
        let semester = self.semesters.get_semester(current.semester_id).await?;
        ensure_open(&semester)?;
        self.require_user(new_tutor_id, Role::Tutor).await?;

        let (old, new) = self
            .assignments
            .replace_assignment(id, new_tutor_id)
            .await?;
        info!(
            old_assignment = old.id,
            new_assignment = new.id,
            new_tutor_id,
            "Student reassigned"
        );
        self.audit
            .record(
                principal,
                "assignment.reassign",
                format!(
                    "Moved student {} from tutor {} to tutor {} (assignment {} -> {})",
                    old.student_id, old.tutor_id, new_tutor_id, old.id, new.id
                ),
            )
            .await;
        Ok((old, new))
    }

    /// Deals every unassigned student in the semester over the tutor pool.
    pub async fn auto_assign(
        &self,
        principal: &Principal,
        semester_id: i64,
        tutor_ids: Option<Vec<i64>>,
    ) -> ServiceResult<AutoAssignOutcome> {
        principal.require(Role::Admin)?;
        let semester = self.semesters.get_semester(semester_id).await?;
        ensure_open(&semester)?;

        let pool = match tutor_ids {
            Some(ids) => {
                let mut seen = HashSet::new();
                let mut pool = Vec::new();
                for id in ids.into_iter().filter(|id| seen.insert(*id)) {
                    self.require_user(id, Role::Tutor).await?;
                    pool.push(id);
                }
                pool
            }
            None => self
                .users
                .active_users_with_role(Role::Tutor)
                .await?
                .into_iter()
                .map(|u| u.id)
                .collect(),
        };
        if pool.is_empty() {
            return Err(ServiceError::Validation(
                "No active tutors available for auto-assignment".to_string(),
            ));
        }

        let students: Vec<i64> = self
            .unassigned_students(semester_id)
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();
        if students.is_empty() {
            return Err(ServiceError::Validation(
                "There are no unassigned students in this semester".to_string(),
            ));
        }

        let batch: Vec<NewAssignment> = distribute(&students, &pool, &mut rand::thread_rng())
            .into_iter()
            .map(|(tutor_id, student_id)| NewAssignment {
                tutor_id,
                student_id,
                semester_id,
            })
            .collect();
        let assignments = self.assignments.insert_assignments(&batch).await?;

        let mut counts: BTreeMap<i64, usize> = pool.iter().map(|id| (*id, 0)).collect();
        for a in &assignments {
            *counts.entry(a.tutor_id).or_default() += 1;
        }
        let per_tutor = counts
            .into_iter()
            .map(|(tutor_id, assigned)| TutorLoad { tutor_id, assigned })
            .collect();

        info!(
            semester_id,
            students = assignments.len(),
            tutors = pool.len(),
            "Auto-assignment completed"
        );
        self.audit
            .record(
                principal,
                "assignment.auto_assign",
                format!(
                    "Auto-assigned {} students across {} tutors in semester {}",
                    assignments.len(),
                    pool.len(),
                    semester_id
                ),
            )
            .await;
        Ok(AutoAssignOutcome {
            assignments,
            per_tutor,
        })
    }

    async fn unassigned_students(&self, semester_id: i64) -> ServiceResult<Vec<UserAccount>> {
        let assigned: HashSet<i64> = self
            .assignments
            .list_assignments(&AssignmentFilter {
                semester_id: Some(semester_id),
                status: Some(AssignmentStatus::Active),
                ..Default::default()
            })
            .await?
            .into_iter()
            .map(|a| a.student_id)
            .collect();

        Ok(self
            .users
            .active_users_with_role(Role::Student)
            .await?
            .into_iter()
            .filter(|u| !assigned.contains(&u.id))
            .collect())
    }

    async fn target_semester(&self, semester_id: Option<i64>) -> ServiceResult<Semester> {
        let semester = match semester_id {
            Some(id) => self.semesters.get_semester(id).await?,
            None => self.semesters.active_semester().await?.ok_or_else(|| {
                ServiceError::NotFound("There is no active semester".to_string())
            })?,
        };
        ensure_open(&semester)?;
        Ok(semester)
    }

    async fn require_user(&self, id: i64, role: Role) -> ServiceResult<UserAccount> {
        match self.users.find_user(id).await? {
            Some(user) if user.is_active_with_role(role) => Ok(user),
            _ => Err(ServiceError::Validation(format!(
                "User {} is not an active {}",
                id, role
            ))),
        }
    }
}

fn ensure_open(semester: &Semester) -> ServiceResult<()> {
    if semester.status == SemesterStatus::Closed {
        return Err(ServiceError::Validation(format!(
            "Semester '{}' is closed",
            semester.name
        )));
    }
    Ok(())
}
