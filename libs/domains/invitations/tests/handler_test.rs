//! Handler tests for the invitations domain
//!
//! Drive the prepare / confirm / execute endpoints over HTTP against the
//! in-memory repository and job queue:
//! - request and response shapes
//! - status codes and error envelopes
//! - the pending action lifecycle end to end

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum_helpers::TenantContext;
use chrono::{Duration, Utc};
use domain_invitations::*;
use domain_notifications::{EmailJobProducer, EmailKind, EmailPayload, InMemoryJobQueue, TracingAnalyticsSink};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use test_utils::TestDataBuilder;
use tower::ServiceExt; // For oneshot()
use uuid::Uuid;

struct TestApp {
    router: Router,
    repo: InMemoryInvitationRepository,
    queue: InMemoryJobQueue,
    tenant: TenantContext,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(InvitationConfig::default())
    }

    fn with_config(config: InvitationConfig) -> Self {
        let repo = InMemoryInvitationRepository::new();
        let queue = InMemoryJobQueue::new();
        let producer = EmailJobProducer::new(Arc::new(queue.clone()), Arc::new(TracingAnalyticsSink));
        let service = InvitationService::new(repo.clone(), producer, config);

        Self {
            router: handlers::router(service),
            repo,
            queue,
            tenant: TenantContext::new(Uuid::now_v7(), Uuid::now_v7()),
        }
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-workspace-id", self.tenant.workspace_id.to_string())
            .header("x-user-id", self.tenant.user_id.to_string())
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn prepare_emails(&self, emails: &[&str]) -> (StatusCode, Value) {
        self.post(
            "/threads/prepare-send",
            json!({ "source_type": "emails", "emails": emails, "title": "Quarterly planning" }),
        )
        .await
    }

    async fn confirm(&self, token: &str, decision: &str) -> (StatusCode, Value) {
        self.post(
            &format!("/pending-actions/{}/confirm", token),
            json!({ "decision": decision }),
        )
        .await
    }

    async fn execute(&self, token: &str) -> (StatusCode, Value) {
        self.post(&format!("/pending-actions/{}/execute", token), json!({})).await
    }
}

fn token_of(body: &Value) -> String {
    body["confirm_token"].as_str().unwrap().to_string()
}

fn pending_id_of(body: &Value) -> Uuid {
    body["pending_action_id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_prepare_dedups_case_insensitively_and_flags_invalid() {
    let app = TestApp::new();

    let (status, body) = app.prepare_emails(&["a@x.com", "A@x.com", "bad"]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["total"], 3);
    assert_eq!(body["summary"]["valid"], 1);
    assert_eq!(body["summary"]["preview"][0]["email"], "a@x.com");
    assert_eq!(body["summary"]["skipped"]["duplicate_input"], 1);
    assert_eq!(body["summary"]["skipped"]["invalid_email"], 1);
    assert_eq!(token_of(&body).len(), 48);
    assert!(body["message_for_chat"].as_str().unwrap().contains("Quarterly planning"));

    // Prepare is advisory only.
    assert_eq!(app.repo.thread_count().await, 0);
    assert!(app.queue.is_empty());
}

#[tokio::test]
async fn test_prepare_sets_fifteen_minute_expiry() {
    let app = TestApp::new();
    let before = Utc::now();

    let (_, body) = app.prepare_emails(&["a@x.com"]).await;

    let expires_at: chrono::DateTime<Utc> = body["expires_at"].as_str().unwrap().parse().unwrap();
    assert!(expires_at >= before + Duration::minutes(15));
    assert!(expires_at <= Utc::now() + Duration::minutes(15));
}

#[tokio::test]
async fn test_prepare_from_oversized_list_is_rejected() {
    let app = TestApp::new();
    let builder = TestDataBuilder::from_test_name("oversized_list");
    let emails = builder.emails(1001);
    let members: Vec<Option<&str>> = emails.iter().map(|e| Some(e.as_str())).collect();
    let list_id = app.repo.add_contact_list(&app.tenant, "Everyone", &members).await;

    let (status, body) = app
        .post(
            "/threads/prepare-send",
            json!({ "source_type": "list", "list_id": list_id }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "list_too_large");
    assert_eq!(body["details"]["total"], 1001);
    assert_eq!(body["details"]["limit"], 1000);
}

#[tokio::test]
async fn test_prepare_from_list_counts_missing_emails() {
    let app = TestApp::new();
    let list_id = app
        .repo
        .add_contact_list(&app.tenant, "Design team", &[Some("a@x.com"), None, Some("b@x.com")])
        .await;

    let (status, body) = app
        .post(
            "/threads/prepare-send",
            json!({ "source_type": "list", "list_id": list_id }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["valid"], 2);
    assert_eq!(body["summary"]["skipped"]["missing_email"], 1);
    assert_eq!(body["summary"]["list_name"], "Design team");
    assert_eq!(body["summary"]["title"], "Design team");
}

#[tokio::test]
async fn test_prepare_with_unknown_list_is_not_found() {
    let app = TestApp::new();
    let (status, body) = app
        .post(
            "/threads/prepare-send",
            json!({ "source_type": "list", "list_id": Uuid::now_v7() }),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "list_not_found");
}

#[tokio::test]
async fn test_prepare_rejects_unknown_source_type() {
    let app = TestApp::new();
    let (status, body) = app
        .post("/threads/prepare-send", json!({ "source_type": "csv", "emails": ["a@x.com"] }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_source_type");
}

#[tokio::test]
async fn test_prepare_with_no_valid_emails_returns_breakdown() {
    let app = TestApp::new();
    let (status, body) = app.prepare_emails(&["nope", "also nope"]).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "no_valid_emails");
    assert_eq!(body["details"]["invalid_email"], 2);
    assert_eq!(body["details"]["total"], 2);
}

#[tokio::test]
async fn test_requests_without_tenant_are_unauthorized() {
    let app = TestApp::new();
    let request = Request::builder()
        .method("POST")
        .uri("/threads/prepare-send")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"source_type":"emails","emails":["a@x.com"]}"#))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_execute_without_confirm_is_rejected() {
    let app = TestApp::new();
    let (_, prepared) = app.prepare_emails(&["a@x.com"]).await;

    let (status, body) = app.execute(&token_of(&prepared)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "not_confirmed");
    assert_eq!(app.repo.invite_count().await, 0);
}

#[tokio::test]
async fn test_cancelled_action_cannot_execute() {
    let app = TestApp::new();
    let (_, prepared) = app.prepare_emails(&["a@x.com", "b@x.com"]).await;
    let token = token_of(&prepared);

    let (status, body) = app.confirm(&token, "cancel").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "cancel");
    assert_eq!(body["can_execute"], false);

    let (status, body) = app.execute(&token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "cancelled");
    assert_eq!(app.repo.invite_count().await, 0);
    assert!(app.queue.is_empty());
}

#[tokio::test]
async fn test_execute_creates_thread_invites_and_jobs() {
    let app = TestApp::new();
    let (_, prepared) = app.prepare_emails(&["a@x.com", "b@x.com", "c@x.com"]).await;
    let token = token_of(&prepared);

    let (status, body) = app.confirm(&token, "send").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["can_execute"], true);

    let (status, body) = app.execute(&token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["inserted"], 3);
    assert_eq!(body["result"]["skipped"], 0);
    assert_eq!(body["result"]["failed"], 0);
    assert_eq!(body["result"]["deliveries"]["email_queued"], 3);

    let thread_id: Uuid = body["thread_id"].as_str().unwrap().parse().unwrap();
    let invites = app.repo.invites_for(thread_id).await;
    assert_eq!(invites.len(), 3);

    let jobs = app.queue.jobs();
    assert_eq!(jobs.len(), 3);
    for job in &jobs {
        assert_eq!(job.kind(), EmailKind::Invite);
        let EmailPayload::Invite(data) = &job.payload else {
            panic!("expected invite payload");
        };
        let invite = invites.iter().find(|i| i.id == data.invite_id).unwrap();
        assert_eq!(job.to, invite.email);
        assert_eq!(data.thread_title, "Quarterly planning");
        assert!(data.invite_url.ends_with(&format!("/invite/{}", invite.token)));
    }

    let action = app.repo.pending_action(pending_id_of(&prepared)).await.unwrap();
    assert_eq!(action.status, PendingStatus::Executed);
    assert_eq!(action.result.unwrap().deliveries.email_queued, 3);
}

#[tokio::test]
async fn test_execute_twice_replays_result() {
    let app = TestApp::new();
    let (_, prepared) = app.prepare_emails(&["a@x.com", "b@x.com"]).await;
    let token = token_of(&prepared);
    app.confirm(&token, "send").await;

    let (_, first) = app.execute(&token).await;
    let (status, second) = app.execute(&token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["thread_id"], second["thread_id"]);
    assert_eq!(first["result"], second["result"]);
    assert_eq!(app.repo.invite_count().await, 2);
    assert_eq!(app.queue.len(), 2);
}

#[tokio::test]
async fn test_execute_records_body_request_id() {
    let app = TestApp::new();
    let (_, prepared) = app.prepare_emails(&["a@x.com"]).await;
    let token = token_of(&prepared);
    app.confirm(&token, "send").await;

    let (status, _) = app
        .post(
            &format!("/pending-actions/{}/execute", token),
            json!({ "request_id": "chat-turn-42" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let action = app.repo.pending_action(pending_id_of(&prepared)).await.unwrap();
    assert_eq!(action.execute_request_id.as_deref(), Some("chat-turn-42"));
}

#[tokio::test]
async fn test_confirm_twice_is_already_processed() {
    let app = TestApp::new();
    let (_, prepared) = app.prepare_emails(&["a@x.com"]).await;
    let token = token_of(&prepared);

    app.confirm(&token, "send").await;
    let (status, body) = app.confirm(&token, "cancel").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "already_processed");
    assert_eq!(body["details"]["status"], "decided");
}

#[tokio::test]
async fn test_confirm_rejects_decision_outside_vocabulary() {
    let app = TestApp::new();
    let (_, prepared) = app.prepare_emails(&["a@x.com"]).await;

    let (status, body) = app.confirm(&token_of(&prepared), "add").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_decision");
    assert_eq!(body["details"]["allowed"], json!(["send", "cancel", "new_thread"]));
}

#[tokio::test]
async fn test_unknown_token_is_not_found() {
    let app = TestApp::new();
    let (status, body) = app.confirm("does-not-exist", "send").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = app.execute("does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_token_of_another_tenant_is_not_found() {
    let owner = TestApp::new();
    let (_, prepared) = owner.prepare_emails(&["a@x.com"]).await;

    let mut intruder = TestApp::new();
    intruder.router = owner.router.clone();
    let (status, _) = intruder.confirm(&token_of(&prepared), "send").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expired_token_fails_confirm_and_execute() {
    let app = TestApp::new();
    let (_, prepared) = app.prepare_emails(&["a@x.com"]).await;
    let id = pending_id_of(&prepared);
    let token = token_of(&prepared);
    app.repo.set_expires_at(id, Utc::now() - Duration::seconds(1)).await;

    let (status, body) = app.confirm(&token, "send").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "expired");
    assert_eq!(app.repo.pending_action(id).await.unwrap().status, PendingStatus::Expired);

    let (status, body) = app.execute(&token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "expired");
}

#[tokio::test]
async fn test_decided_then_expired_fails_execute() {
    let app = TestApp::new();
    let (_, prepared) = app.prepare_emails(&["a@x.com"]).await;
    let id = pending_id_of(&prepared);
    let token = token_of(&prepared);
    app.confirm(&token, "send").await;
    app.repo.set_expires_at(id, Utc::now() - Duration::seconds(1)).await;

    let (status, body) = app.execute(&token).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "expired");
    assert_eq!(app.repo.pending_action(id).await.unwrap().status, PendingStatus::Expired);
    assert_eq!(app.repo.invite_count().await, 0);
}

#[tokio::test]
async fn test_executed_action_replays_after_expiry() {
    let app = TestApp::new();
    let (_, prepared) = app.prepare_emails(&["a@x.com"]).await;
    let token = token_of(&prepared);
    app.confirm(&token, "send").await;
    app.execute(&token).await;
    app.repo
        .set_expires_at(pending_id_of(&prepared), Utc::now() - Duration::seconds(1))
        .await;

    let (status, body) = app.execute(&token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["inserted"], 1);
}

#[tokio::test]
async fn test_thread_prepare_skips_already_invited() {
    let app = TestApp::new();
    let thread_id = app.repo.add_thread(&app.tenant, "Offsite").await;
    app.repo.add_invite(thread_id, "Taken@X.com").await;

    let (status, body) = app
        .post(
            &format!("/threads/{}/invites/prepare", thread_id),
            json!({ "source_type": "emails", "emails": ["taken@x.com", "new@x.com", "NEW@x.com"] }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["action_type"], "add_invites");
    assert_eq!(body["summary"]["title"], "Offsite");
    assert_eq!(body["summary"]["valid"], 1);
    assert_eq!(body["summary"]["skipped"]["already_invited"], 1);
    assert_eq!(body["summary"]["skipped"]["duplicate_input"], 1);
    assert_eq!(body["summary"]["preview"][0]["email"], "new@x.com");
}

#[tokio::test]
async fn test_thread_prepare_where_everyone_is_invited() {
    let app = TestApp::new();
    let thread_id = app.repo.add_thread(&app.tenant, "Offsite").await;
    app.repo.add_invite(thread_id, "a@x.com").await;

    let (status, body) = app
        .post(
            &format!("/threads/{}/invites/prepare", thread_id),
            json!({ "source_type": "emails", "emails": ["A@x.com"] }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "no_valid_emails");
    assert_eq!(body["details"]["already_invited"], 1);
}

#[tokio::test]
async fn test_thread_prepare_for_unknown_thread() {
    let app = TestApp::new();
    let (status, body) = app
        .post(
            &format!("/threads/{}/invites/prepare", Uuid::now_v7()),
            json!({ "source_type": "emails", "emails": ["a@x.com"] }),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "thread_not_found");
}

#[tokio::test]
async fn test_add_invites_to_existing_thread() {
    let app = TestApp::new();
    let thread_id = app.repo.add_thread(&app.tenant, "Offsite").await;
    app.repo.add_invite(thread_id, "old@x.com").await;

    let (_, prepared) = app
        .post(
            &format!("/threads/{}/invites/prepare", thread_id),
            json!({ "source_type": "emails", "emails": ["new@x.com"] }),
        )
        .await;
    let token = token_of(&prepared);
    app.confirm(&token, "send").await;

    let (status, body) = app.execute(&token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["thread_id"], thread_id.to_string());
    assert_eq!(app.repo.invites_for(thread_id).await.len(), 2);
    assert_eq!(app.repo.thread_count().await, 1);
}

#[tokio::test]
async fn test_new_thread_decision_forks_a_thread() {
    let app = TestApp::new();
    let thread_id = app.repo.add_thread(&app.tenant, "Offsite").await;

    let (_, prepared) = app
        .post(
            &format!("/threads/{}/invites/prepare", thread_id),
            json!({ "source_type": "emails", "emails": ["a@x.com"] }),
        )
        .await;
    let token = token_of(&prepared);
    app.confirm(&token, "new_thread").await;

    let (status, body) = app.execute(&token).await;

    assert_eq!(status, StatusCode::OK);
    let forked: Uuid = body["thread_id"].as_str().unwrap().parse().unwrap();
    assert_ne!(forked, thread_id);
    assert_eq!(app.repo.thread_count().await, 2);
    assert!(app.repo.invites_for(thread_id).await.is_empty());
    assert_eq!(app.repo.invites_for(forked).await.len(), 1);
}

#[tokio::test]
async fn test_existing_users_get_in_app_notifications() {
    let app = TestApp::new();
    let user_id = app.repo.add_user("Member@X.com", "Member").await;

    let (_, prepared) = app.prepare_emails(&["member@x.com", "guest@x.com"]).await;
    assert_eq!(prepared["summary"]["preview"][0]["is_existing_user"], true);
    assert_eq!(prepared["summary"]["preview"][1]["is_existing_user"], false);

    let token = token_of(&prepared);
    app.confirm(&token, "send").await;
    let (_, body) = app.execute(&token).await;

    assert_eq!(body["result"]["deliveries"]["in_app_created"], 1);
    let notifications = app.repo.notifications().await;
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].user_id, user_id);
    assert_eq!(notifications[0].workspace_id, app.tenant.workspace_id);
}

#[tokio::test]
async fn test_row_failures_do_not_abort_the_batch() {
    let app = TestApp::new();
    app.repo.fail_inserts_for("b@x.com").await;

    let (_, prepared) = app.prepare_emails(&["a@x.com", "b@x.com", "c@x.com"]).await;
    let token = token_of(&prepared);
    app.confirm(&token, "send").await;
    let (status, body) = app.execute(&token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["inserted"], 2);
    assert_eq!(body["result"]["failed"], 1);
    assert_eq!(body["result"]["deliveries"]["email_queued"], 2);
    assert_eq!(app.queue.len(), 2);
}

#[tokio::test]
async fn test_slot_proposal_flow() {
    let app = TestApp::new();
    let thread_id = app.repo.add_thread(&app.tenant, "Offsite").await;
    app.repo.add_invite(thread_id, "a@x.com").await;
    app.repo.add_invite(thread_id, "b@x.com").await;

    let start = Utc::now() + Duration::days(2);
    let slot = json!({ "start": start, "end": start + Duration::minutes(30) });
    let (status, prepared) = app
        .post(
            &format!("/threads/{}/slots/prepare", thread_id),
            json!({ "slots": [slot, slot] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(prepared["summary"]["action_type"], "add_slots");
    assert_eq!(prepared["summary"]["valid"], 1);
    assert_eq!(prepared["summary"]["skipped"]["duplicate_input"], 1);

    let token = token_of(&prepared);
    let (status, body) = app.confirm(&token, "send").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["allowed"], json!(["add", "cancel"]));

    let (status, _) = app.confirm(&token, "add").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.execute(&token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["inserted"], 1);
    assert_eq!(body["result"]["deliveries"]["email_queued"], 2);
    assert_eq!(app.repo.slots_for(thread_id).await.len(), 1);

    let jobs = app.queue.jobs();
    assert!(jobs.iter().all(|job| job.kind() == EmailKind::AdditionalSlots));
}

#[tokio::test]
async fn test_slot_prepare_rejects_backwards_range() {
    let app = TestApp::new();
    let thread_id = app.repo.add_thread(&app.tenant, "Offsite").await;
    let start = Utc::now() + Duration::days(1);

    let (status, _) = app
        .post(
            &format!("/threads/{}/slots/prepare", thread_id),
            json!({ "slots": [{ "start": start, "end": start - Duration::minutes(30) }] }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_custom_audience_limit() {
    let app = TestApp::with_config(InvitationConfig {
        audience_limit: 2,
        ..Default::default()
    });

    let (status, body) = app.prepare_emails(&["a@x.com", "b@x.com", "c@x.com"]).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["limit"], 2);
}
