//! Ledger and queue behaviour against real Postgres and Redis.

use domain_notifications::{
    DeliveryLedger, DeliveryPolicy, DeliveryRef, EmailDeliveryProcessor, EmailJob, EmailPayload,
    EmailStream, JobQueue, MockEmailProvider, PgDeliveryLedger, RedisJobQueue, TemplateEngine,
    ThreadMessageData,
};
use sea_orm::{ConnectionTrait, DbBackend, Statement};
use std::sync::Arc;
use stream_worker::{StreamConsumer, StreamProcessor, WorkerConfig};
use test_utils::{TestDataBuilder, TestDatabase, TestRedis};
use uuid::Uuid;

async fn seed_broadcast(db: &TestDatabase, thread_id: Uuid, status: &str) -> Uuid {
    let id = Uuid::now_v7();
    db.connection()
        .execute_raw(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "INSERT INTO broadcast_deliveries (id, thread_id, email, status) VALUES ($1, $2, $3, $4)",
            [id.into(), thread_id.into(), "guest@example.com".into(), status.into()],
        ))
        .await
        .unwrap();
    id
}

async fn seed_thread_message_delivery(db: &TestDatabase, thread_id: Uuid, message_id: Uuid) -> Uuid {
    let id = Uuid::now_v7();
    db.connection()
        .execute_raw(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "INSERT INTO thread_message_deliveries (id, thread_id, message_id, email) VALUES ($1, $2, $3, $4)",
            [id.into(), thread_id.into(), message_id.into(), "guest@example.com".into()],
        ))
        .await
        .unwrap();
    id
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_pg_ledger_marks_sent_and_failed() {
    let db = TestDatabase::new().await;
    let data = TestDataBuilder::from_test_name("test_pg_ledger_marks_sent_and_failed");
    let thread_id = db.seed_thread(data.workspace_id(), data.user_id(), "Team sync").await;
    let ledger = PgDeliveryLedger::new(db.connection());

    let sent = DeliveryRef::Broadcast(seed_broadcast(&db, thread_id, "pending").await);
    let failed = DeliveryRef::Broadcast(seed_broadcast(&db, thread_id, "pending").await);

    assert!(!ledger.is_sent(&sent).await.unwrap());
    ledger.mark_sent(&sent, "msg_123").await.unwrap();
    assert!(ledger.is_sent(&sent).await.unwrap());

    ledger.mark_failed(&sent, "late failure").await.unwrap();
    ledger.mark_failed(&failed, "bounced").await.unwrap();

    assert_eq!(
        db.count(
            "broadcast_deliveries",
            &format!("id = '{}' AND status = 'sent' AND provider_id = 'msg_123' AND sent_at IS NOT NULL", sent.id())
        )
        .await,
        1
    );
    assert_eq!(
        db.count("broadcast_deliveries", &format!("id = '{}' AND status = 'failed'", failed.id()))
            .await,
        1
    );
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_queued_job_is_delivered_once() {
    let db = TestDatabase::new().await;
    let redis = TestRedis::new().await;
    let data = TestDataBuilder::from_test_name("test_queued_job_is_delivered_once");
    let thread_id = db.seed_thread(data.workspace_id(), data.user_id(), "Team sync").await;
    let message_id = Uuid::now_v7();
    let delivery_id = seed_thread_message_delivery(&db, thread_id, message_id).await;

    let queue = RedisJobQueue::new(redis.connection());
    let job = EmailJob::new(
        "guest@example.com",
        "New message",
        EmailPayload::ThreadMessage(ThreadMessageData {
            delivery_id,
            thread_id,
            message_id,
            thread_title: "Team sync".into(),
            sender_name: "Ana".into(),
            message: "Hello".into(),
            thread_url: "https://rally.local/threads/1".into(),
        }),
    );
    queue.publish(&job).await.unwrap();

    let consumer = StreamConsumer::new(
        redis.connection(),
        WorkerConfig::from_stream_def::<EmailStream>()
            .with_consumer_id("it-consumer")
            .with_blocking(Some(100)),
    );
    consumer.init_consumer_group().await.unwrap();
    let batch = consumer.read_new::<EmailJob>().await.unwrap();
    assert_eq!(batch.events.len(), 1);
    assert_eq!(batch.events[0].job, job);

    let provider = MockEmailProvider::new();
    let processor = EmailDeliveryProcessor::new(
        Arc::new(provider.clone()),
        TemplateEngine::new().unwrap(),
        Arc::new(PgDeliveryLedger::new(db.connection())),
        DeliveryPolicy::default(),
    );

    processor.process(&batch.events[0].job).await.unwrap();
    assert_eq!(provider.call_count(), 1);
    assert_eq!(
        db.count(
            "thread_message_deliveries",
            &format!("id = '{}' AND status = 'sent'", delivery_id)
        )
        .await,
        1
    );

    // Redelivery of the same job is a no-op.
    processor.process(&job).await.unwrap();
    assert_eq!(provider.call_count(), 1);
    consumer.ack(&batch.events[0].stream_id).await.unwrap();
}
