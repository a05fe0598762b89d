//! Logging bootstrap: color-eyre reports plus a `tracing-subscriber` registry.

use crate::Environment;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, prelude::*};

/// Install color-eyre with file:line locations and no env section.
///
/// Call first in `main`, before anything fallible. Repeat calls are ignored.
pub fn install_color_eyre() {
    let _ = color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install();
}

/// Directives used when `RUST_LOG` is unset. `audit` stays at `info` in every
/// environment so prepare/confirm/execute events are never filtered out.
pub fn default_directives(environment: &Environment) -> &'static str {
    if environment.is_production() {
        "info,audit=info,tower_http=info,sea_orm=warn,sqlx=warn"
    } else {
        "debug,audit=info,hyper=info,h2=info,sqlx=warn,handlebars=info"
    }
}

/// Install the global subscriber: flattened JSON events in production, pretty
/// output otherwise, both with `tracing_error::ErrorLayer` so eyre reports
/// carry span traces. `RUST_LOG` overrides [`default_directives`].
///
/// A second call (common in tests) leaves the first subscriber in place.
///
/// ```ignore
/// #[instrument(skip(repository), fields(token = %token))]
/// async fn load(repository: &PgInvitationRepository, tenant: &TenantContext, token: &str) -> eyre::Result<PendingAction> {
///     repository.find_by_token(tenant, token).await?.ok_or_else(|| eyre!("unknown token"))
/// }
/// ```
pub fn init_tracing(environment: &Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(environment)));

    let result = if environment.is_production() {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .flatten_event(true),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(false).pretty())
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    };

    match result {
        Ok(()) => info!(environment = ?environment, "Tracing initialized"),
        Err(_) => debug!("Tracing already initialized"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_keep_audit_events() {
        for environment in [Environment::Development, Environment::Production] {
            let directives = default_directives(&environment);
            assert!(directives.contains("audit=info"));
            assert!(EnvFilter::try_new(directives).is_ok());
        }
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing(&Environment::Production);
        init_tracing(&Environment::Development);
    }

    #[test]
    fn test_init_tracing_with_rust_log() {
        temp_env::with_var("RUST_LOG", Some("rally_api=trace"), || {
            init_tracing(&Environment::Development);
        });
    }
}
