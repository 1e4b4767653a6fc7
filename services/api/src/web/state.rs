//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use jsonwebtoken::DecodingKey;
use std::sync::Arc;
use tutoring_core::ports::{
    AssignmentStore, AuditStore, CertificateStore, Clock, DocumentRenderer, DocumentStorage,
    Mailer, SemesterStore, SessionStore, UserDirectory,
};
use tutoring_core::{
    AssignmentManager, AuditTrail, CertificateOutputs, CertificateService, ReportService,
    SemesterManager, SessionTracker,
};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub decoding_key: DecodingKey,
    pub semesters: SemesterManager,
    pub assignments: AssignmentManager,
    pub sessions: SessionTracker,
    pub certificates: CertificateService,
    pub reports: ReportService,
    pub audit: AuditTrail,
}

/// The non-persistence collaborators the managers need.
#[derive(Clone)]
pub struct Collaborators {
    pub renderer: Arc<dyn DocumentRenderer>,
    pub storage: Arc<dyn DocumentStorage>,
    pub mailer: Arc<dyn Mailer>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wires every manager to one gateway that implements all store ports.
    pub fn assemble<G>(gateway: Arc<G>, collaborators: Collaborators, config: Arc<Config>) -> Self
    where
        G: SemesterStore
            + AssignmentStore
            + SessionStore
            + CertificateStore
            + UserDirectory
            + AuditStore
            + 'static,
    {
        let audit = AuditTrail::new(gateway.clone());
        let Collaborators {
            renderer,
            storage,
            mailer,
            clock,
        } = collaborators;

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            config,
            semesters: SemesterManager::new(gateway.clone(), audit.clone()),
            assignments: AssignmentManager::new(
                gateway.clone(),
                gateway.clone(),
                gateway.clone(),
                mailer.clone(),
                audit.clone(),
            ),
            sessions: SessionTracker::new(
                gateway.clone(),
                gateway.clone(),
                gateway.clone(),
                clock.clone(),
                audit.clone(),
            ),
            certificates: CertificateService::new(
                gateway.clone(),
                gateway.clone(),
                gateway.clone(),
                gateway.clone(),
                gateway.clone(),
                CertificateOutputs {
                    renderer,
                    storage,
                    mailer,
                    clock,
                },
                audit.clone(),
            ),
            reports: ReportService::new(
                gateway.clone(),
                gateway.clone(),
                gateway.clone(),
                gateway.clone(),
                gateway,
            ),
            audit,
        }
    }
}
