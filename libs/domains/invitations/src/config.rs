use chrono::Duration;
use core_config::{ConfigError, FromEnv, env_or_default, env_parse};

/// Invitation pipeline settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvitationConfig {
    /// Lifetime of a confirm token (`PENDING_ACTION_TTL_SECS`, default 15 minutes).
    pub pending_action_ttl: Duration,
    /// Hard cap on resolved recipients per request (`AUDIENCE_LIMIT`).
    pub audience_limit: usize,
    /// Public origin used in invite links (`APP_BASE_URL`).
    pub app_base_url: String,
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            pending_action_ttl: Duration::minutes(15),
            audience_limit: 1000,
            app_base_url: "http://localhost:3000".to_string(),
        }
    }
}

impl InvitationConfig {
    pub fn invite_url(&self, token: &str) -> String {
        format!("{}/invite/{}", self.app_base_url.trim_end_matches('/'), token)
    }

    pub fn thread_url(&self, thread_id: uuid::Uuid) -> String {
        format!("{}/threads/{}", self.app_base_url.trim_end_matches('/'), thread_id)
    }
}

impl FromEnv for InvitationConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let ttl_secs: i64 = env_parse("PENDING_ACTION_TTL_SECS", 900)?;
        if ttl_secs <= 0 {
            return Err(ConfigError::ParseError {
                key: "PENDING_ACTION_TTL_SECS".to_string(),
                details: "must be positive".to_string(),
            });
        }

        Ok(Self {
            pending_action_ttl: Duration::seconds(ttl_secs),
            audience_limit: env_parse("AUDIENCE_LIMIT", 1000)?,
            app_base_url: env_or_default("APP_BASE_URL", "http://localhost:3000"),
        })
    }
}
