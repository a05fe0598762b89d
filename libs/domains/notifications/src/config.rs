//! Provider and delivery configuration.

use core_config::{ConfigError, FromEnv, env_optional, env_or_default, env_parse};
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://api.resend.com/emails";
const DEFAULT_FROM: &str = "Rally <noreply@rally.local>";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3_000;

/// Transactional email API settings.
///
/// With no `EMAIL_API_KEY` the provider runs in mock mode and never leaves the process.
#[derive(Clone, Debug)]
pub struct EmailProviderConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub from: String,
    /// Upper bound for one provider call, connect through response body.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl EmailProviderConfig {
    pub fn mock() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            from: DEFAULT_FROM.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }

    pub fn is_mock(&self) -> bool {
        self.api_key.is_none()
    }
}

impl FromEnv for EmailProviderConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let request_timeout_ms: u64 = env_parse("EMAIL_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?;
        if request_timeout_ms == 0 {
            return Err(ConfigError::ParseError {
                key: "EMAIL_REQUEST_TIMEOUT_MS".to_string(),
                details: "must be greater than 0".to_string(),
            });
        }
        let connect_timeout_ms: u64 = env_parse("EMAIL_CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT_MS)?;

        Ok(Self {
            api_key: env_optional("EMAIL_API_KEY"),
            api_url: env_or_default("EMAIL_API_URL", DEFAULT_API_URL),
            from: env_or_default("EMAIL_FROM", DEFAULT_FROM),
            request_timeout: Duration::from_millis(request_timeout_ms),
            connect_timeout: Duration::from_millis(connect_timeout_ms.clamp(1, request_timeout_ms)),
        })
    }
}

/// Throttling and local retry policy of the delivery worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryPolicy {
    /// Pause after every successful send. The provider allows about 2 requests per second.
    pub send_spacing: Duration,
    /// Total provider calls per message when the provider keeps answering 429.
    pub max_send_attempts: u32,
    pub rate_limit_wait: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            send_spacing: Duration::from_millis(650),
            max_send_attempts: 3,
            rate_limit_wait: Duration::from_millis(1000),
        }
    }
}

impl FromEnv for DeliveryPolicy {
    fn from_env() -> Result<Self, ConfigError> {
        let max_send_attempts: u32 = env_parse("EMAIL_MAX_SEND_ATTEMPTS", 3)?;
        if max_send_attempts == 0 {
            return Err(ConfigError::ParseError {
                key: "EMAIL_MAX_SEND_ATTEMPTS".to_string(),
                details: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            send_spacing: Duration::from_millis(env_parse("EMAIL_SEND_SPACING_MS", 650)?),
            max_send_attempts,
            rate_limit_wait: Duration::from_millis(env_parse("EMAIL_RATE_LIMIT_WAIT_MS", 1000)?),
        })
    }
}
