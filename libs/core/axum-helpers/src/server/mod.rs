//! Server bootstrap: router assembly with docs and middleware, health and
//! readiness helpers, and signal-driven graceful shutdown.
//!
//! ```ignore
//! let router = create_router::<ApiDoc>(api_routes)?.merge(health_router(app_info!()));
//! create_production_app(router, &config, ShutdownCoordinator::new(), Duration::from_secs(30), cleanup).await?;
//! ```

pub mod app;
pub mod health;
mod security;
pub mod shutdown;

pub use app::{create_production_app, create_router};
pub use health::{health_router, run_health_checks, HealthCheckFuture, HealthResponse};
pub use security::security_headers;
pub use shutdown::{shutdown_signal, ShutdownCoordinator};
