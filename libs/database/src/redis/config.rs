#[cfg(feature = "config")]
use core_config::{env_optional, ConfigError, FromEnv};

/// Where the job and analytics streams live.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    /// Full connection string, credentials and database index included
    pub url: String,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self::new("redis://127.0.0.1:6379")
    }
}

/// Reads `REDIS_URL`, falling back to `REDIS_HOST`.
#[cfg(feature = "config")]
impl FromEnv for RedisConfig {
    fn from_env() -> Result<Self, ConfigError> {
        env_optional("REDIS_URL")
            .or_else(|| env_optional("REDIS_HOST"))
            .map(Self::new)
            .ok_or_else(|| ConfigError::MissingEnvVar("REDIS_URL or REDIS_HOST".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_config_default() {
        assert_eq!(RedisConfig::default().url, "redis://127.0.0.1:6379");
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_redis_config_from_env_prefers_url() {
        temp_env::with_vars(
            [
                ("REDIS_URL", Some("redis://queue:6379")),
                ("REDIS_HOST", Some("redis://other:6379")),
            ],
            || {
                let config = RedisConfig::from_env().unwrap();
                assert_eq!(config.url, "redis://queue:6379");
            },
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_redis_config_from_env_with_redis_host() {
        temp_env::with_vars(
            [("REDIS_URL", None::<&str>), ("REDIS_HOST", Some("redis://prod:6379"))],
            || {
                let config = RedisConfig::from_env().unwrap();
                assert_eq!(config.url, "redis://prod:6379");
            },
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_redis_config_from_env_missing() {
        temp_env::with_vars([("REDIS_URL", None::<&str>), ("REDIS_HOST", None::<&str>)], || {
            let err = RedisConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("REDIS"));
        });
    }
}
