//! Email Worker Service
//!
//! Drains the email job stream one message at a time.
//!
//! ## Architecture
//!
//! ```text
//! Redis Stream (email:jobs)
//!   ↓ (Consumer Group: email_workers)
//! StreamWorker<EmailJob, EmailDeliveryProcessor>
//!   ↓ (ledger check, Handlebars render)
//! HttpEmailProvider (mock mode without EMAIL_API_KEY)
//!   ↓ (429 → wait 1s, up to 3 calls; 650ms between sends)
//! Delivery ledger (invites, broadcast and thread-message rows)
//! ```
//!
//! Failed messages stay pending and are reclaimed after `WORKER_CLAIM_IDLE_MS`;
//! permanent failures and spent retry budgets land in `email:dlq`.

use axum::Router;
use axum_helpers::ShutdownCoordinator;
use core_config::{ConfigError, Environment, FromEnv, app_info, env_parse};
use database::postgres::PostgresConfig;
use database::redis::RedisConfig;
use domain_notifications::{
    DeliveryPolicy, EmailDeliveryProcessor, EmailJob, EmailProviderConfig, EmailStream,
    HttpEmailProvider, PgDeliveryLedger, TemplateEngine,
};
use eyre::{Result, WrapErr};
use std::sync::Arc;
use stream_worker::{HealthState, StreamWorker, WorkerConfig, metrics, worker_router};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Settings of the worker process itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Port of the health/admin server (`EMAIL_WORKER_HEALTH_PORT`, default 8081).
    /// Never `PORT`, which belongs to the API.
    pub health_port: u16,
}

impl FromEnv for WorkerSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            health_port: env_parse("EMAIL_WORKER_HEALTH_PORT", 8081)?,
        })
    }
}

/// Serve `/health`, `/ready`, `/stream/info`, `/metrics` and `/admin/dlq/*`.
async fn start_health_server(health_state: HealthState, port: u16) -> Result<()> {
    let app: Router = worker_router(health_state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind health server to {}", addr))?;

    info!(port = %port, "Health and admin server listening");

    axum::serve(listener, app)
        .await
        .wrap_err("Health server failed")?;

    Ok(())
}

/// Run the email worker until SIGINT/SIGTERM.
///
/// The message in flight when the signal arrives is finished (including its
/// post-send spacing) before the worker returns.
pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    if let Err(e) = metrics::init_metrics() {
        warn!(error = %e, "Prometheus recorder not installed");
    }

    let app_info = app_info!();
    info!(name = %app_info.name, version = %app_info.version, "Starting email worker service");

    let settings = WorkerSettings::from_env().wrap_err("Failed to load worker settings")?;
    let redis_config = RedisConfig::from_env().wrap_err("Failed to load Redis configuration")?;
    let postgres_config = PostgresConfig::from_env().wrap_err("Failed to load PostgreSQL configuration")?;
    let provider_config = EmailProviderConfig::from_env().wrap_err("Failed to load email provider configuration")?;
    let policy = DeliveryPolicy::from_env().wrap_err("Failed to load delivery policy")?;

    let (redis, db) = tokio::try_join!(
        async {
            database::redis::connect_from_config_with_retry(redis_config, None)
                .await
                .wrap_err("Failed to connect to Redis")
        },
        async {
            database::postgres::connect_from_config_with_retry(postgres_config, None)
                .await
                .wrap_err("Failed to connect to PostgreSQL")
        },
    )?;

    // ConnectionManager multiplexes one connection; a blocking XREADGROUP would
    // stall XAUTOCLAIM and the health probes behind it. WORKER_BLOCK_MS opts in.
    let worker_config = WorkerConfig::from_stream_def::<EmailStream>()
        .with_blocking(None)
        .with_env_overrides()
        .wrap_err("Failed to load worker configuration")?;
    info!(
        stream = %worker_config.stream_name,
        consumer_group = %worker_config.consumer_group,
        consumer_id = %worker_config.consumer_id,
        claim_idle_ms = worker_config.claim_idle_ms,
        "Worker configuration loaded"
    );

    if provider_config.is_mock() {
        warn!("EMAIL_API_KEY not set, emails are logged instead of sent");
    }
    info!(
        send_spacing_ms = policy.send_spacing.as_millis() as u64,
        max_send_attempts = policy.max_send_attempts,
        rate_limit_wait_ms = policy.rate_limit_wait.as_millis() as u64,
        request_timeout_ms = provider_config.request_timeout.as_millis() as u64,
        "Delivery policy loaded"
    );

    let templates = TemplateEngine::new().wrap_err("Failed to initialize template engine")?;
    let provider = HttpEmailProvider::new(provider_config).wrap_err("Failed to build email provider")?;
    let processor = EmailDeliveryProcessor::new(
        Arc::new(provider),
        templates,
        Arc::new(PgDeliveryLedger::new(db.clone())),
        policy,
    );

    let shutdown = ShutdownCoordinator::new();
    let signals = shutdown.clone();
    tokio::spawn(async move { signals.wait_for_signal().await });

    let health_state = HealthState::new(
        redis.clone(),
        app_info.name,
        app_info.version,
        worker_config.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_state, settings.health_port).await {
            error!(error = %e, "Health server failed");
        }
    });

    let worker = StreamWorker::<EmailJob, _>::new(redis, processor, worker_config);
    worker
        .run(shutdown.subscribe())
        .await
        .map_err(|e| eyre::eyre!("{}", e))?;

    if let Err(e) = db.close().await {
        error!(error = %e, "Error closing PostgreSQL");
    }

    info!("Email worker service stopped");
    Ok(())
}
