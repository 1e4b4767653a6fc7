//! crates/tutoring_core/src/auth.rs
//!
//! The authenticated caller as the core sees it. Token decoding happens in the
//! web layer; the core only checks roles.

use crate::domain::Role;
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub role: Role,
    /// Client address as seen by the web layer, recorded in the audit log.
    pub source_ip: Option<String>,
}

impl Principal {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self {
            user_id,
            role,
            source_ip: None,
        }
    }

    pub fn with_source_ip(mut self, ip: impl Into<String>) -> Self {
        self.source_ip = Some(ip.into());
        self
    }

    /// Label stored next to the actor id in audit entries.
    pub fn label(&self) -> String {
        format!("{}#{}", self.role, self.user_id)
    }

    pub fn require(&self, role: Role) -> ServiceResult<()> {
        self.require_any(&[role])
    }

    pub fn require_any(&self, roles: &[Role]) -> ServiceResult<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "role '{}' may not perform this operation",
                self.role
            )))
        }
    }
}
