use axum_helpers::ShutdownCoordinator;
use axum_helpers::server::{create_production_app, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_invitations::{InvitationService, PgInvitationRepository};
use domain_notifications::{EmailJobProducer, RedisAnalyticsSink, RedisJobQueue};
use std::sync::Arc;
use tracing::info;

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output (before any fallible operations)
    install_color_eyre();

    let config = Config::from_env()?;

    init_tracing(&config.environment);

    let postgres_future = async {
        database::postgres::connect_from_config_with_retry(config.database.clone(), None)
            .await
            .map_err(|e| eyre::eyre!("PostgreSQL connection failed: {}", e))
    };

    let redis_future = async {
        database::redis::connect_from_config_with_retry(config.redis.clone(), None)
            .await
            .map_err(|e| eyre::eyre!("Redis connection failed: {}", e))
    };

    let (db, redis) = tokio::try_join!(postgres_future, redis_future)?;

    database::postgres::run_migrations::<migration::Migrator>(&db, config.app.name)
        .await
        .map_err(|e| eyre::eyre!("Migrations failed: {}", e))?;

    let producer = EmailJobProducer::new(
        Arc::new(RedisJobQueue::new(redis.clone())),
        Arc::new(RedisAnalyticsSink::new(redis.clone())),
    );
    let invitations = InvitationService::new(
        PgInvitationRepository::new(db.clone()),
        producer,
        config.invitations.clone(),
    );
    info!(
        audience_limit = config.invitations.audience_limit,
        ttl_secs = config.invitations.pending_action_ttl.num_seconds(),
        "Invitation service ready"
    );

    let state = AppState {
        config,
        db,
        redis,
        invitations,
    };

    let api_routes = api::routes(&state);

    // create_router adds docs/middleware to our composed routes
    let router = axum_helpers::create_router::<openapi::ApiDoc>(api_routes)?;

    // - /health: liveness check with app name/version
    // - /ready: readiness check with actual db/redis health checks
    let app = router
        .merge(health_router(state.config.app.clone()))
        .merge(api::ready_router(state.clone()));

    let server = state.config.server.clone();
    info!(shutdown_timeout = ?server.shutdown_timeout, "Starting rally API with graceful shutdown");

    create_production_app(
        app,
        &server,
        ShutdownCoordinator::new(),
        server.shutdown_timeout,
        async move {
            info!("Shutting down: closing database connections");
            match state.db.close().await {
                Ok(_) => info!("PostgreSQL connection closed successfully"),
                Err(e) => tracing::error!("Error closing PostgreSQL: {}", e),
            }
            // Redis ConnectionManager closes on drop
            drop(state.redis);
        },
    )
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Rally API shutdown complete");
    Ok(())
}
