//! Error types for the notifications domain.

use stream_worker::StreamError;
use thiserror::Error;

pub type NotificationResult<T> = Result<T, NotificationError>;

#[derive(Debug, Error)]
pub enum NotificationError {
    /// Provider answered 429 or reported a rate limit.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Email provider error: {0}")]
    ProviderError(String),

    #[error("Template rendering error: {0}")]
    TemplateError(String),

    #[error("Queue error: {0}")]
    QueueError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NotificationError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, NotificationError::RateLimitExceeded(_))
    }
}

impl From<redis::RedisError> for NotificationError {
    fn from(err: redis::RedisError) -> Self {
        NotificationError::QueueError(err.to_string())
    }
}

impl From<StreamError> for NotificationError {
    fn from(err: StreamError) -> Self {
        NotificationError::QueueError(err.to_string())
    }
}

impl From<sea_orm::DbErr> for NotificationError {
    fn from(err: sea_orm::DbErr) -> Self {
        NotificationError::DatabaseError(err.to_string())
    }
}

impl From<handlebars::RenderError> for NotificationError {
    fn from(err: handlebars::RenderError) -> Self {
        NotificationError::TemplateError(err.to_string())
    }
}

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return NotificationError::ProviderError(format!("request timed out: {}", err));
        }
        NotificationError::ProviderError(err.to_string())
    }
}

impl From<serde_json::Error> for NotificationError {
    fn from(err: serde_json::Error) -> Self {
        NotificationError::Internal(format!("JSON serialization error: {}", err))
    }
}

impl From<core_config::ConfigError> for NotificationError {
    fn from(err: core_config::ConfigError) -> Self {
        NotificationError::ConfigError(err.to_string())
    }
}

/// Maps delivery failures onto the worker's redelivery policy.
impl From<NotificationError> for StreamError {
    fn from(e: NotificationError) -> Self {
        match e {
            NotificationError::RateLimitExceeded(msg) => StreamError::rate_limited(msg),
            NotificationError::TemplateError(_)
            | NotificationError::ConfigError(_)
            | NotificationError::Internal(_) => StreamError::permanent(e.to_string()),
            other => StreamError::transient(other.to_string()),
        }
    }
}
