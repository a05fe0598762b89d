//! Builds typed email jobs and publishes them to the queue.

use crate::analytics::AnalyticsSink;
use crate::error::NotificationResult;
use crate::models::{
    AdditionalSlotsData, BroadcastData, EmailJob, EmailPayload, FinalizedData, InviteData,
    OneOnOneData, OtpData, ReminderData, ThreadMessageData,
};
use crate::queue::JobQueue;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Identifiers of a published job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedEmail {
    pub job_id: Uuid,
    pub stream_id: String,
}

/// One method per job kind. Callers pass already resolved addresses; nothing
/// here validates business state.
#[derive(Clone)]
pub struct EmailJobProducer {
    queue: Arc<dyn JobQueue>,
    analytics: Arc<dyn AnalyticsSink>,
}

impl EmailJobProducer {
    pub fn new(queue: Arc<dyn JobQueue>, analytics: Arc<dyn AnalyticsSink>) -> Self {
        Self { queue, analytics }
    }

    pub async fn enqueue_otp(&self, to: &str, data: OtpData) -> NotificationResult<QueuedEmail> {
        self.publish(to, EmailPayload::Otp(data)).await
    }

    pub async fn enqueue_invite(&self, to: &str, data: InviteData) -> NotificationResult<QueuedEmail> {
        self.publish(to, EmailPayload::Invite(data)).await
    }

    pub async fn enqueue_broadcast(
        &self,
        to: &str,
        data: BroadcastData,
    ) -> NotificationResult<QueuedEmail> {
        self.publish(to, EmailPayload::Broadcast(data)).await
    }

    pub async fn enqueue_thread_message(
        &self,
        to: &str,
        data: ThreadMessageData,
    ) -> NotificationResult<QueuedEmail> {
        self.publish(to, EmailPayload::ThreadMessage(data)).await
    }

    pub async fn enqueue_reminder(
        &self,
        to: &str,
        data: ReminderData,
    ) -> NotificationResult<QueuedEmail> {
        self.publish(to, EmailPayload::Reminder(data)).await
    }

    pub async fn enqueue_finalized(
        &self,
        to: &str,
        data: FinalizedData,
    ) -> NotificationResult<QueuedEmail> {
        self.publish(to, EmailPayload::Finalized(data)).await
    }

    pub async fn enqueue_additional_slots(
        &self,
        to: &str,
        data: AdditionalSlotsData,
    ) -> NotificationResult<QueuedEmail> {
        self.publish(to, EmailPayload::AdditionalSlots(data)).await
    }

    pub async fn enqueue_one_on_one(
        &self,
        to: &str,
        data: OneOnOneData,
    ) -> NotificationResult<QueuedEmail> {
        self.publish(to, EmailPayload::OneOnOne(data)).await
    }

    async fn publish(&self, to: &str, payload: EmailPayload) -> NotificationResult<QueuedEmail> {
        let job = EmailJob::new(to, subject_for(&payload), payload);
        let stream_id = self.queue.publish(&job).await?;

        info!(job_id = %job.job_id, kind = %job.kind(), stream_id = %stream_id, "Email job enqueued");
        self.analytics.emit(
            "email_job_enqueued",
            json!({
                "job_id": job.job_id,
                "type": job.kind().as_ref(),
                "stream_id": stream_id,
            }),
        );

        Ok(QueuedEmail {
            job_id: job.job_id,
            stream_id,
        })
    }
}

/// Subject line for a payload.
pub fn subject_for(payload: &EmailPayload) -> String {
    match payload {
        EmailPayload::Otp(_) => "Your Rally sign-in code".to_string(),
        EmailPayload::Invite(d) => format!("{} invited you to \"{}\"", d.inviter_name, d.thread_title),
        EmailPayload::Broadcast(d) => format!("Update from {} on \"{}\"", d.sender_name, d.thread_title),
        EmailPayload::ThreadMessage(d) => format!("New message in \"{}\"", d.thread_title),
        EmailPayload::Reminder(d) => format!("Reminder: share your availability for \"{}\"", d.thread_title),
        EmailPayload::Finalized(d) => format!("\"{}\" is scheduled", d.thread_title),
        EmailPayload::AdditionalSlots(d) => format!("New times proposed for \"{}\"", d.thread_title),
        EmailPayload::OneOnOne(d) => format!("{} would like to meet with you", d.organizer_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::MockAnalyticsSink;
    use crate::error::NotificationError;
    use crate::models::EmailKind;
    use crate::queue::InMemoryJobQueue;
    use async_trait::async_trait;

    fn invite_data() -> InviteData {
        InviteData {
            invite_id: Uuid::now_v7(),
            thread_id: Uuid::now_v7(),
            thread_title: "Team sync".into(),
            inviter_name: "Ana".into(),
            invite_url: "https://rally.local/invite/tok".into(),
            message: None,
        }
    }

    #[tokio::test]
    async fn test_enqueue_invite_publishes_and_emits_event() {
        let queue = InMemoryJobQueue::new();
        let mut analytics = MockAnalyticsSink::new();
        analytics
            .expect_emit()
            .withf(|event, props| event == "email_job_enqueued" && props["type"] == "invite")
            .times(1)
            .return_const(());

        let producer = EmailJobProducer::new(Arc::new(queue.clone()), Arc::new(analytics));
        let queued = producer.enqueue_invite("guest@example.com", invite_data()).await.unwrap();

        let jobs = queue.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_id, queued.job_id);
        assert_eq!(jobs[0].kind(), EmailKind::Invite);
        assert_eq!(jobs[0].to, "guest@example.com");
        assert_eq!(jobs[0].subject, "Ana invited you to \"Team sync\"");
    }

    struct FailingQueue;

    #[async_trait]
    impl JobQueue for FailingQueue {
        async fn publish(&self, _job: &EmailJob) -> NotificationResult<String> {
            Err(NotificationError::QueueError("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_publish_failure_emits_nothing() {
        let mut analytics = MockAnalyticsSink::new();
        analytics.expect_emit().times(0);

        let producer = EmailJobProducer::new(Arc::new(FailingQueue), Arc::new(analytics));
        let result = producer
            .enqueue_otp(
                "a@example.com",
                OtpData {
                    code: "123456".into(),
                    expires_in_minutes: 10,
                },
            )
            .await;

        assert!(matches!(result, Err(NotificationError::QueueError(_))));
    }

    #[test]
    fn test_subjects() {
        let finalized = EmailPayload::Finalized(FinalizedData {
            thread_id: Uuid::nil(),
            thread_title: "Offsite".into(),
            organizer_name: "Ana".into(),
            start_at: chrono::Utc::now(),
            end_at: chrono::Utc::now(),
            thread_url: "https://rally.local/threads/1".into(),
        });
        assert_eq!(subject_for(&finalized), "\"Offsite\" is scheduled");

        let one_on_one = EmailPayload::OneOnOne(OneOnOneData {
            thread_id: Uuid::nil(),
            thread_title: "Coffee".into(),
            organizer_name: "Ana".into(),
            booking_url: "https://rally.local/b/1".into(),
            message: None,
        });
        assert_eq!(subject_for(&one_on_one), "Ana would like to meet with you");
    }
}
