//! # Axum Helpers
//!
//! Shared HTTP plumbing for the rally services.
//!
//! - **[`errors`]**: the `{code, error, message, details, request_id}` envelope and [`AppError`]
//! - **[`extractors`]**: validated JSON, tenant context, request id, UUID path
//! - **[`server`]**: router assembly, health/readiness, graceful shutdown
//! - **[`audit`]**: audit events for tenant-visible state changes

pub mod audit;
pub mod errors;
pub mod extractors;
pub mod server;

pub use server::{
    HealthCheckFuture, HealthResponse, ShutdownCoordinator, create_production_app, create_router,
    health_router, run_health_checks, shutdown_signal,
};

pub use errors::{AppError, DomainError, ErrorCode, ErrorResponse};

pub use extractors::{RequestId, TenantContext, UuidPath, ValidatedJson};

pub use audit::{AuditEvent, AuditOutcome, extract_ip_from_headers};
