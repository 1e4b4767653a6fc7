//! crates/tutoring_core/src/semesters.rs
//!
//! Semester lifecycle. At most one semester is active at any time; activating
//! one closes the previous one inside the same gateway transaction.

use std::sync::Arc;
use tracing::info;

use crate::audit::AuditTrail;
use crate::auth::Principal;
use crate::domain::{Role, Semester, SemesterDraft, SemesterStatus};
use crate::error::{require_text, ServiceError, ServiceResult};
use crate::ports::SemesterStore;

#[derive(Clone)]
pub struct SemesterManager {
    store: Arc<dyn SemesterStore>,
    audit: AuditTrail,
}

impl SemesterManager {
    pub fn new(store: Arc<dyn SemesterStore>, audit: AuditTrail) -> Self {
        Self { store, audit }
    }

    pub async fn list(&self) -> ServiceResult<Vec<Semester>> {
        Ok(self.store.list_semesters().await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Semester> {
        Ok(self.store.get_semester(id).await?)
    }

    /// The single active semester. Callers treat `NotFound` as a hard failure.
    pub async fn current(&self) -> ServiceResult<Semester> {
        self.store
            .active_semester()
            .await?
            .ok_or_else(|| ServiceError::NotFound("There is no active semester".to_string()))
    }

    pub async fn create(
        &self,
        principal: &Principal,
        draft: SemesterDraft,
    ) -> ServiceResult<Semester> {
        principal.require(Role::Admin)?;
        let draft = validate(draft)?;

        let semester = self.store.insert_semester(&draft).await?;
        info!(semester_id = semester.id, status = %semester.status, "Semester created");
        self.audit
            .record(
                principal,
                "semester.create",
                format!("Created semester '{}' ({})", semester.name, semester.status),
            )
            .await;
        Ok(semester)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: i64,
        draft: SemesterDraft,
    ) -> ServiceResult<Semester> {
        principal.require(Role::Admin)?;
        let draft = validate(draft)?;
        self.store.get_semester(id).await?;

        let semester = self.store.update_semester(id, &draft).await?;
        info!(semester_id = id, status = %semester.status, "Semester updated");
        self.audit
            .record(
                principal,
                "semester.update",
                format!("Updated semester {} '{}' ({})", id, semester.name, semester.status),
            )
            .await;
        Ok(semester)
    }

    /// Makes `id` the active semester, closing whichever one was active.
    pub async fn activate(&self, principal: &Principal, id: i64) -> ServiceResult<Semester> {
        principal.require(Role::Admin)?;
        let existing = self.store.get_semester(id).await?;
        let draft = SemesterDraft {
            name: existing.name,
            start_date: existing.start_date,
            end_date: existing.end_date,
            status: SemesterStatus::Active,
        };

        let semester = self.store.update_semester(id, &draft).await?;
        info!(semester_id = id, "Semester activated");
        self.audit
            .record(
                principal,
                "semester.activate",
                format!("Activated semester {} '{}'", id, semester.name),
            )
            .await;
        Ok(semester)
    }

    pub async fn close(&self, principal: &Principal, id: i64) -> ServiceResult<Semester> {
        principal.require(Role::Admin)?;
        let affected = self.store.close_semester(id).await?;
        if affected == 0 {
            return Err(ServiceError::Validation(format!(
                "Semester {} does not exist or is already closed",
                id
            )));
        }

        let semester = self.store.get_semester(id).await?;
        info!(semester_id = id, "Semester closed");
        self.audit
            .record(
                principal,
                "semester.close",
                format!("Closed semester {} '{}'", id, semester.name),
            )
            .await;
        Ok(semester)
    }
}

fn validate(mut draft: SemesterDraft) -> ServiceResult<SemesterDraft> {
    require_text("name", &draft.name)?;
    draft.name = draft.name.trim().to_string();
    if draft.end_date <= draft.start_date {
        return Err(ServiceError::Validation(
            "end_date must be after start_date".to_string(),
        ));
    }
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn draft(name: &str, status: SemesterStatus) -> SemesterDraft {
        SemesterDraft {
            name: name.to_string(),
            start_date: date(2025, 1, 15),
            end_date: date(2025, 6, 30),
            status,
        }
    }

    fn manager() -> (SemesterManager, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let audit = AuditTrail::new(store.clone());
        (SemesterManager::new(store.clone(), audit), store)
    }

    async fn active_count(manager: &SemesterManager) -> usize {
        manager
            .list()
            .await
            .unwrap()
            .iter()
            .filter(|s| s.status == SemesterStatus::Active)
            .count()
    }

    #[tokio::test]
    async fn creating_an_active_semester_closes_the_previous_one() {
        let (manager, _) = manager();
        let admin = Principal::new(1, Role::Admin);
        let first = manager
            .create(&admin, draft("2025-I", SemesterStatus::Active))
            .await
            .unwrap();

        let second = manager
            .create(
                &admin,
                SemesterDraft {
                    name: "2025-II".to_string(),
                    start_date: date(2025, 8, 1),
                    end_date: date(2025, 12, 15),
                    status: SemesterStatus::Active,
                },
            )
            .await
            .unwrap();

        assert_eq!(manager.get(first.id).await.unwrap().status, SemesterStatus::Closed);
        assert_eq!(manager.current().await.unwrap().id, second.id);
        assert_eq!(active_count(&manager).await, 1);
    }

    #[tokio::test]
    async fn inverted_dates_and_blank_names_are_rejected() {
        let (manager, _) = manager();
        let admin = Principal::new(1, Role::Admin);
        let mut inverted = draft("2025-I", SemesterStatus::Scheduled);
        inverted.end_date = inverted.start_date;
        assert!(matches!(
            manager.create(&admin, inverted).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            manager.create(&admin, draft("   ", SemesterStatus::Scheduled)).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(manager.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_of_missing_semester_is_not_found() {
        let (manager, _) = manager();
        let admin = Principal::new(1, Role::Admin);
        assert!(matches!(
            manager
                .update(&admin, 99, draft("2025-I", SemesterStatus::Active))
                .await,
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(active_count(&manager).await, 0);
    }

    #[tokio::test]
    async fn activating_keeps_a_single_active_semester() {
        let (manager, _) = manager();
        let admin = Principal::new(1, Role::Admin);
        let a = manager
            .create(&admin, draft("A", SemesterStatus::Active))
            .await
            .unwrap();
        let b = manager
            .create(&admin, draft("B", SemesterStatus::Scheduled))
            .await
            .unwrap();

        manager.activate(&admin, b.id).await.unwrap();
        assert_eq!(manager.get(a.id).await.unwrap().status, SemesterStatus::Closed);
        assert_eq!(manager.current().await.unwrap().id, b.id);

        // Re-activating the active one does not close it.
        manager.activate(&admin, b.id).await.unwrap();
        assert_eq!(manager.current().await.unwrap().id, b.id);
        assert_eq!(active_count(&manager).await, 1);
    }

    #[tokio::test]
    async fn close_fails_when_nothing_changes() {
        let (manager, _) = manager();
        let admin = Principal::new(1, Role::Admin);
        let s = manager
            .create(&admin, draft("A", SemesterStatus::Active))
            .await
            .unwrap();

        let closed = manager.close(&admin, s.id).await.unwrap();
        assert_eq!(closed.status, SemesterStatus::Closed);
        assert!(matches!(
            manager.close(&admin, s.id).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            manager.close(&admin, 404).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(manager.current().await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn non_admins_cannot_mutate_semesters() {
        let (manager, _) = manager();
        let tutor = Principal::new(7, Role::Tutor);
        assert!(matches!(
            manager.create(&tutor, draft("A", SemesterStatus::Active)).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn mutations_are_audited() {
        let (manager, store) = manager();
        let admin = Principal::new(1, Role::Admin);
        let s = manager
            .create(&admin, draft("A", SemesterStatus::Scheduled))
            .await
            .unwrap();
        manager.activate(&admin, s.id).await.unwrap();
        manager.close(&admin, s.id).await.unwrap();

        let trail = AuditTrail::new(store);
        let page = trail
            .query(&admin, crate::audit::AuditQuery::default())
            .await
            .unwrap();
        let actions: Vec<&str> = page.items.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, ["semester.close", "semester.activate", "semester.create"]);
    }
}
