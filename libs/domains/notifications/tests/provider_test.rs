//! HTTP provider behaviour against a local stub of the email API.

use axum::{Json, Router, http::StatusCode, routing::post};
use domain_notifications::{
    DeliveryOutcome, DeliveryPolicy, DeliveryRef, DeliveryStatus, EmailContent, EmailDeliveryProcessor,
    EmailJob, EmailPayload, EmailProvider, EmailProviderConfig, HttpEmailProvider, InMemoryDeliveryLedger,
    TemplateEngine, ThreadMessageData,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use stream_worker::{ErrorCategory, StreamError, StreamProcessor};
use tokio::net::TcpListener;
use tokio::time::Instant;
use uuid::Uuid;

/// Serves `status` + `body` on `/emails`, counting hits, optionally after a delay.
async fn stub_api(status: StatusCode, body: Value, delay: Duration) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let router = Router::new().route(
        "/emails",
        post(move || {
            let counter = counter.clone();
            let body = body.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                (status, Json(body))
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{}/emails", addr), hits)
}

fn config(api_url: String, timeout: Duration) -> EmailProviderConfig {
    EmailProviderConfig {
        api_key: Some("re_test".into()),
        api_url,
        from: "Rally <noreply@rally.local>".into(),
        request_timeout: timeout,
        connect_timeout: timeout,
    }
}

fn content() -> EmailContent {
    EmailContent {
        to: "guest@example.com".into(),
        subject: "New message".into(),
        html: "<p>Moved to 3pm</p>".into(),
        text: "Moved to 3pm".into(),
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

fn processor(provider: HttpEmailProvider, ledger: &InMemoryDeliveryLedger) -> EmailDeliveryProcessor {
    EmailDeliveryProcessor::new(
        Arc::new(provider),
        TemplateEngine::new().unwrap(),
        Arc::new(ledger.clone()),
        DeliveryPolicy {
            send_spacing: Duration::ZERO,
            ..DeliveryPolicy::default()
        },
    )
}

#[tokio::test]
async fn test_accepted_send_uses_provider_id() {
    let (url, hits) = stub_api(StatusCode::OK, json!({ "id": "msg_123" }), Duration::ZERO).await;
    let provider = HttpEmailProvider::new(config(url, Duration::from_secs(5))).unwrap();

    let sent = provider.send(&content()).await.unwrap();

    assert_eq!(sent.provider_id, "msg_123");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_accepted_send_with_unexpected_body_is_not_resent() {
    let (url, hits) = stub_api(StatusCode::OK, json!({ "messageId": "abc" }), Duration::ZERO).await;
    let provider = HttpEmailProvider::new(config(url, Duration::from_secs(5))).unwrap();
    let ledger = InMemoryDeliveryLedger::new();
    let delivery_id = Uuid::now_v7();
    ledger.insert(DeliveryRef::ThreadMessage(delivery_id), DeliveryStatus::Pending);
    let processor = processor(provider, &ledger);
    let job = thread_message_job(delivery_id);

    processor.process(&job).await.unwrap();

    let record = ledger.get(&DeliveryRef::ThreadMessage(delivery_id)).unwrap();
    assert_eq!(record.status, DeliveryStatus::Sent);
    assert!(record.provider_id.unwrap().starts_with("unknown-"));

    // Redelivery of the same job is answered from the ledger.
    assert_eq!(processor.deliver(&job).await.unwrap(), DeliveryOutcome::AlreadySent);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_hung_provider_times_out_as_transient() {
    let (url, hits) = stub_api(StatusCode::OK, json!({ "id": "late" }), Duration::from_secs(30)).await;
    let provider = HttpEmailProvider::new(config(url, Duration::from_millis(200))).unwrap();

    let started = Instant::now();
    let err = provider.send(&content()).await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!err.is_rate_limited());
    assert_eq!(StreamError::from(err).category(), ErrorCategory::Transient);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_too_many_requests_is_rate_limited() {
    let (url, _) = stub_api(
        StatusCode::TOO_MANY_REQUESTS,
        json!({ "message": "slow down" }),
        Duration::ZERO,
    )
    .await;
    let provider = HttpEmailProvider::new(config(url, Duration::from_secs(5))).unwrap();

    let err = provider.send(&content()).await.unwrap_err();

    assert!(err.is_rate_limited());
    assert_eq!(StreamError::from(err).category(), ErrorCategory::RateLimited);
}
