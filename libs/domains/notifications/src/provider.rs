//! Transactional email provider.

use crate::config::EmailProviderConfig;
use crate::error::{NotificationError, NotificationResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Rendered message ready for the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    /// Provider's message id.
    pub provider_id: String,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, email: &EmailContent) -> NotificationResult<SentEmail>;

    fn name(&self) -> &'static str;

    async fn health_check(&self) -> NotificationResult<bool> {
        Ok(true)
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

/// JSON-over-HTTP provider. Runs in mock mode when no API key is configured.
#[derive(Clone)]
pub struct HttpEmailProvider {
    client: reqwest::Client,
    config: EmailProviderConfig,
}

impl HttpEmailProvider {
    pub fn new(config: EmailProviderConfig) -> NotificationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| NotificationError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn is_mock(&self) -> bool {
        self.config.is_mock()
    }
}

#[async_trait]
impl EmailProvider for HttpEmailProvider {
    async fn send(&self, email: &EmailContent) -> NotificationResult<SentEmail> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            let provider_id = format!("mock-{}", Uuid::new_v4());
            info!(to = %email.to, subject = %email.subject, provider_id = %provider_id, "Mock mode, email not sent");
            return Ok(SentEmail { provider_id });
        };

        let request = SendRequest {
            from: &self.config.from,
            to: [&email.to],
            subject: &email.subject,
            html: &email.html,
            text: &email.text,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        // Any 2xx means the provider took the message; the body only names it.
        if status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let provider_id = accepted_provider_id(&body);
            debug!(to = %email.to, provider_id = %provider_id, "Email accepted by provider");
            return Ok(SentEmail { provider_id });
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status.as_u16(), body))
    }

    fn name(&self) -> &'static str {
        "http"
    }

    async fn health_check(&self) -> NotificationResult<bool> {
        if self.is_mock() {
            return Ok(true);
        }
        Ok(!self.config.api_url.is_empty())
    }
}

/// Message id from an accepted send, or `unknown-<uuid>` when the body has none.
pub(crate) fn accepted_provider_id(body: &str) -> String {
    match serde_json::from_str::<SendResponse>(body) {
        Ok(response) => response.id,
        Err(e) => {
            let fallback = format!("unknown-{}", Uuid::now_v7());
            warn!(error = %e, provider_id = %fallback, "Provider accepted the email without a readable id");
            fallback
        }
    }
}

/// Non-2xx answers: 429 or a body mentioning a rate limit is retryable locally.
pub(crate) fn classify_failure(status: u16, body: String) -> NotificationError {
    if status == 429 || body.to_lowercase().contains("rate limit") {
        NotificationError::RateLimitExceeded(format!("status {}: {}", status, body))
    } else {
        NotificationError::ProviderError(format!("status {}: {}", status, body))
    }
}

/// Scripted provider for tests.
///
/// Each `send` pops the next scripted outcome; once the script is empty every
/// send succeeds. Every call is recorded with the (tokio) instant it was made.
#[derive(Clone, Default)]
pub struct MockEmailProvider {
    script: Arc<Mutex<VecDeque<NotificationResult<SentEmail>>>>,
    calls: Arc<Mutex<Vec<(Instant, EmailContent)>>>,
}

impl MockEmailProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: NotificationResult<SentEmail>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(response);
        }
    }

    pub fn push_rate_limited(&self) {
        self.push_response(Err(NotificationError::RateLimitExceeded("status 429".into())));
    }

    pub fn calls(&self) -> Vec<(Instant, EmailContent)> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send(&self, email: &EmailContent) -> NotificationResult<SentEmail> {
        let position = {
            let mut calls = self
                .calls
                .lock()
                .map_err(|e| NotificationError::Internal(e.to_string()))?;
            calls.push((Instant::now(), email.clone()));
            calls.len()
        };

        let scripted = self
            .script
            .lock()
            .map_err(|e| NotificationError::Internal(e.to_string()))?
            .pop_front();

        scripted.unwrap_or_else(|| {
            Ok(SentEmail {
                provider_id: format!("mock-{}", position),
            })
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content() -> EmailContent {
        EmailContent {
            to: "guest@example.com".into(),
            subject: "Hi".into(),
            html: "<p>Hi</p>".into(),
            text: "Hi".into(),
        }
    }

    #[tokio::test]
    async fn test_mock_mode_returns_synthetic_id() {
        let provider = HttpEmailProvider::new(EmailProviderConfig::mock()).unwrap();
        assert!(provider.is_mock());

        let sent = provider.send(&content()).await.unwrap();
        assert!(sent.provider_id.starts_with("mock-"));
    }

    #[test]
    fn test_classify_failure() {
        assert!(classify_failure(429, String::new()).is_rate_limited());
        assert!(classify_failure(400, "Rate limit reached, slow down".into()).is_rate_limited());
        assert!(!classify_failure(500, "internal".into()).is_rate_limited());
        assert!(matches!(
            classify_failure(422, "invalid to".into()),
            NotificationError::ProviderError(_)
        ));
    }

    #[test]
    fn test_accepted_provider_id() {
        assert_eq!(accepted_provider_id(r#"{"id":"msg_123"}"#), "msg_123");
        assert!(accepted_provider_id(r#"{"messageId":"abc"}"#).starts_with("unknown-"));
        assert!(accepted_provider_id("").starts_with("unknown-"));
    }

    #[tokio::test]
    async fn test_scripted_provider() {
        let provider = MockEmailProvider::new();
        provider.push_rate_limited();

        assert!(provider.send(&content()).await.unwrap_err().is_rate_limited());
        assert_eq!(provider.send(&content()).await.unwrap().provider_id, "mock-2");
        assert_eq!(provider.call_count(), 2);
    }
}
