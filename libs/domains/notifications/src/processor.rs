//! Delivery processor run by the email worker.
//!
//! Messages are handled one at a time. Per message:
//!
//! 1. broadcast and thread-message jobs whose delivery row is already `sent`
//!    are acknowledged without calling the provider
//! 2. the job is rendered into html and text bodies
//! 3. the provider is called; a rate-limit answer is retried locally after
//!    `rate_limit_wait`, up to `max_send_attempts` calls in total, any other
//!    error is returned at once
//! 4. on success the delivery row is marked `sent`, then the processor pauses
//!    for `send_spacing` before the worker hands it the next message
//!
//! A returned error leaves the message pending in the consumer group, which
//! redelivers it and eventually dead-letters it.

use crate::config::DeliveryPolicy;
use crate::error::NotificationResult;
use crate::ledger::DeliveryLedger;
use crate::models::EmailJob;
use crate::provider::{EmailContent, EmailProvider, SentEmail};
use crate::templates::TemplateEngine;
use async_trait::async_trait;
use std::sync::Arc;
use stream_worker::{StreamError, StreamProcessor};
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent { provider_id: String },
    /// The delivery row was already `sent`; the provider was not called.
    AlreadySent,
}

#[derive(Clone)]
pub struct EmailDeliveryProcessor {
    provider: Arc<dyn EmailProvider>,
    templates: TemplateEngine,
    ledger: Arc<dyn DeliveryLedger>,
    policy: DeliveryPolicy,
}

impl EmailDeliveryProcessor {
    pub fn new(
        provider: Arc<dyn EmailProvider>,
        templates: TemplateEngine,
        ledger: Arc<dyn DeliveryLedger>,
        policy: DeliveryPolicy,
    ) -> Self {
        Self {
            provider,
            templates,
            ledger,
            policy,
        }
    }

    pub fn policy(&self) -> &DeliveryPolicy {
        &self.policy
    }

    pub async fn deliver(&self, job: &EmailJob) -> NotificationResult<DeliveryOutcome> {
        let delivery = job.payload.delivery_ref();

        if job.payload.is_idempotency_tracked()
            && let Some(delivery) = delivery.as_ref()
            && self.ledger.is_sent(delivery).await?
        {
            info!(job_id = %job.job_id, kind = %job.kind(), "Already sent, skipping");
            return Ok(DeliveryOutcome::AlreadySent);
        }

        let rendered = self.templates.render(job)?;
        let content = EmailContent {
            to: job.to.clone(),
            subject: job.subject.clone(),
            html: rendered.html,
            text: rendered.text,
        };

        let sent = self.send_with_retry(job, &content).await?;
        info!(
            job_id = %job.job_id,
            kind = %job.kind(),
            provider = self.provider.name(),
            provider_id = %sent.provider_id,
            "Email sent"
        );

        if let Some(delivery) = delivery.as_ref() {
            // The email is out; a ledger failure must not trigger a resend.
            if let Err(e) = self.ledger.mark_sent(delivery, &sent.provider_id).await {
                error!(job_id = %job.job_id, table = delivery.table(), error = %e, "Failed to mark delivery sent");
            }
        }

        tokio::time::sleep(self.policy.send_spacing).await;

        Ok(DeliveryOutcome::Sent {
            provider_id: sent.provider_id,
        })
    }

    async fn send_with_retry(&self, job: &EmailJob, content: &EmailContent) -> NotificationResult<SentEmail> {
        let mut attempt = 1;
        loop {
            match self.provider.send(content).await {
                Ok(sent) => return Ok(sent),
                Err(e) if e.is_rate_limited() && attempt < self.policy.max_send_attempts => {
                    warn!(
                        job_id = %job.job_id,
                        attempt,
                        max_attempts = self.policy.max_send_attempts,
                        wait_ms = self.policy.rate_limit_wait.as_millis() as u64,
                        "Provider rate limit hit, retrying"
                    );
                    tokio::time::sleep(self.policy.rate_limit_wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl StreamProcessor<EmailJob> for EmailDeliveryProcessor {
    async fn process(&self, job: &EmailJob) -> Result<(), StreamError> {
        self.deliver(job).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email_delivery"
    }

    async fn health_check(&self) -> Result<bool, StreamError> {
        self.provider
            .health_check()
            .await
            .map_err(|e| StreamError::transient(e.to_string()))
    }

    async fn on_dead_letter(&self, job: &EmailJob, error: &str) {
        let Some(delivery) = job.payload.delivery_ref() else {
            return;
        };
        if let Err(e) = self.ledger.mark_failed(&delivery, error).await {
            error!(job_id = %job.job_id, error = %e, "Failed to mark delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotificationError;
    use crate::ledger::{DeliveryStatus, InMemoryDeliveryLedger};
    use crate::models::{BroadcastData, DeliveryRef, EmailPayload, InviteData, OtpData, ThreadMessageData};
    use crate::provider::MockEmailProvider;
    use std::time::Duration;
    use stream_worker::ErrorCategory;
    use uuid::Uuid;

    struct Harness {
        processor: EmailDeliveryProcessor,
        provider: MockEmailProvider,
        ledger: InMemoryDeliveryLedger,
    }

    fn harness() -> Harness {
        let provider = MockEmailProvider::new();
        let ledger = InMemoryDeliveryLedger::new();
        let processor = EmailDeliveryProcessor::new(
            Arc::new(provider.clone()),
            TemplateEngine::new().unwrap(),
            Arc::new(ledger.clone()),
            DeliveryPolicy::default(),
        );
        Harness {
            processor,
            provider,
            ledger,
        }
    }

    fn thread_message_job(delivery_id: Uuid) -> EmailJob {
        EmailJob::new(
            "guest@example.com",
            "New message in \"Team sync\"",
            EmailPayload::ThreadMessage(ThreadMessageData {
                delivery_id,
                thread_id: Uuid::now_v7(),
                message_id: Uuid::now_v7(),
                thread_title: "Team sync".into(),
                sender_name: "Ana".into(),
                message: "Moved to 3pm".into(),
                thread_url: "https://rally.local/threads/1".into(),
            }),
        )
    }

    fn invite_job(invite_id: Uuid) -> EmailJob {
        EmailJob::new(
            "guest@example.com",
            "Ana invited you to \"Team sync\"",
            EmailPayload::Invite(InviteData {
                invite_id,
                thread_id: Uuid::now_v7(),
                thread_title: "Team sync".into(),
                inviter_name: "Ana".into(),
                invite_url: "https://rally.local/invite/tok".into(),
                message: None,
            }),
        )
    }

    fn otp_job() -> EmailJob {
        EmailJob::new(
            "guest@example.com",
            "Your Rally sign-in code",
            EmailPayload::Otp(OtpData {
                code: "123456".into(),
                expires_in_minutes: 10,
            }),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_sent_thread_message_skips_provider() {
        let h = harness();
        let delivery_id = Uuid::now_v7();
        h.ledger.insert(DeliveryRef::ThreadMessage(delivery_id), DeliveryStatus::Sent);

        let outcome = h.processor.deliver(&thread_message_job(delivery_id)).await.unwrap();

        assert_eq!(outcome, DeliveryOutcome::AlreadySent);
        assert_eq!(h.provider.call_count(), 0);
        assert!(h.processor.process(&thread_message_job(delivery_id)).await.is_ok());
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_twice_then_sent() {
        let h = harness();
        h.provider.push_rate_limited();
        h.provider.push_rate_limited();

        let outcome = h.processor.deliver(&otp_job()).await.unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Sent { .. }));

        let calls = h.provider.calls();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            let gap = pair[1].0 - pair[0].0;
            assert!(gap >= Duration::from_secs(1), "gap was {:?}", gap);
            assert!(gap < Duration::from_millis(1100), "gap was {:?}", gap);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_budget_is_three_attempts() {
        let h = harness();
        for _ in 0..3 {
            h.provider.push_rate_limited();
        }
        let delivery_id = Uuid::now_v7();
        h.ledger.insert(DeliveryRef::Broadcast(delivery_id), DeliveryStatus::Pending);

        let job = EmailJob::new(
            "guest@example.com",
            "Update",
            EmailPayload::Broadcast(BroadcastData {
                delivery_id,
                thread_id: Uuid::now_v7(),
                thread_title: "Team sync".into(),
                sender_name: "Ana".into(),
                message: "Agenda attached".into(),
                thread_url: "https://rally.local/threads/1".into(),
            }),
        );

        let err = h.processor.process(&job).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::RateLimited);
        assert_eq!(h.provider.call_count(), 3);
        assert!(!h.ledger.is_sent(&DeliveryRef::Broadcast(delivery_id)).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_provider_errors_are_not_retried() {
        let h = harness();
        h.provider
            .push_response(Err(NotificationError::ProviderError("status 500".into())));

        let err = h.processor.process(&otp_job()).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Transient);
        assert_eq!(h.provider.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_sends_are_spaced() {
        let h = harness();
        h.processor.deliver(&otp_job()).await.unwrap();
        h.processor.deliver(&otp_job()).await.unwrap();

        let calls = h.provider.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].0 - calls[0].0 >= Duration::from_millis(650));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invite_is_marked_sent_with_provider_id() {
        let h = harness();
        let invite_id = Uuid::now_v7();
        h.ledger.insert(DeliveryRef::Invite(invite_id), DeliveryStatus::Pending);

        let outcome = h.processor.deliver(&invite_job(invite_id)).await.unwrap();

        let record = h.ledger.get(&DeliveryRef::Invite(invite_id)).unwrap();
        assert_eq!(record.status, DeliveryStatus::Sent);
        assert_eq!(
            outcome,
            DeliveryOutcome::Sent {
                provider_id: record.provider_id.unwrap()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_invites_are_not_skipped_by_ledger() {
        let h = harness();
        let invite_id = Uuid::now_v7();
        h.ledger.insert(DeliveryRef::Invite(invite_id), DeliveryStatus::Sent);

        h.processor.deliver(&invite_job(invite_id)).await.unwrap();
        assert_eq!(h.provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_dead_letter_marks_delivery_failed() {
        let h = harness();
        let delivery_id = Uuid::now_v7();
        h.ledger.insert(DeliveryRef::ThreadMessage(delivery_id), DeliveryStatus::Pending);

        h.processor
            .on_dead_letter(&thread_message_job(delivery_id), "status 500")
            .await;

        let record = h.ledger.get(&DeliveryRef::ThreadMessage(delivery_id)).unwrap();
        assert_eq!(record.status, DeliveryStatus::Failed);
    }
}
