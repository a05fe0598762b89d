//! Shared application state passed to route builders and the readiness probe.

use domain_invitations::{InvitationService, PgInvitationRepository};

#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded from environment variables
    pub config: crate::config::Config,
    /// PostgreSQL database connection pool
    pub db: database::postgres::DatabaseConnection,
    /// Redis connection manager, shared by the job queue and analytics sink
    pub redis: database::redis::ConnectionManager,
    pub invitations: InvitationService<PgInvitationRepository>,
}
