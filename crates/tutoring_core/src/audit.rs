//! crates/tutoring_core/src/audit.rs
//!
//! Append-only audit trail. Recording happens after the business transaction
//! has committed, so a failing audit store is logged and otherwise ignored.

use std::sync::Arc;
use tracing::warn;

use crate::auth::Principal;
use crate::domain::{AuditLogEntry, NewAuditEntry, Role};
use crate::error::ServiceResult;
use crate::ports::{AuditFilter, AuditStore, Page};

pub const MAX_PER_PAGE: u32 = 100;
pub const DEFAULT_PER_PAGE: u32 = 20;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditQuery {
    pub actor_id: Option<i64>,
    pub action: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn AuditStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, actor: &Principal, action: &str, description: impl Into<String>) {
        let entry = NewAuditEntry {
            actor_id: actor.user_id,
            actor_label: actor.label(),
            action: action.to_string(),
            description: description.into(),
            source_ip: actor.source_ip.clone(),
        };
        if let Err(e) = self.store.append_audit(&entry).await {
            warn!(action, actor = actor.user_id, "Failed to append audit entry: {}", e);
        }
    }

    pub async fn query(
        &self,
        principal: &Principal,
        query: AuditQuery,
    ) -> ServiceResult<Page<AuditLogEntry>> {
        principal.require(Role::Admin)?;

        let page = query.page.unwrap_or(1).max(1);
        let per_page = query
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        let filter = AuditFilter {
            actor_id: query.actor_id,
            action: query.action.filter(|a| !a.trim().is_empty()),
        };

        Ok(self.store.query_audit(&filter, page, per_page).await?)
    }
}
