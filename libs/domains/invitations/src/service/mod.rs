//! Prepare → confirm → execute.
//!
//! Prepare resolves the audience and stages a [`PendingAction`] behind a
//! random confirm token. Confirm records one decision. Execute runs the staged
//! work once and queues one email per new invite; repeats replay the stored
//! result.

mod confirm;
mod execute;
mod prepare;

use chrono::{DateTime, Utc};
use domain_notifications::EmailJobProducer;
use std::sync::Arc;

use crate::audience::AudienceResolver;
use crate::config::InvitationConfig;
use crate::error::{InvitationError, InvitationResult};
use crate::models::{PendingAction, PendingStatus};
use crate::repository::InvitationRepository;

/// Service layer for staged invitations
pub struct InvitationService<R: InvitationRepository> {
    repository: Arc<R>,
    producer: EmailJobProducer,
    resolver: AudienceResolver,
    config: InvitationConfig,
}

impl<R: InvitationRepository> Clone for InvitationService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            producer: self.producer.clone(),
            resolver: self.resolver,
            config: self.config.clone(),
        }
    }
}

impl<R: InvitationRepository> InvitationService<R> {
    pub fn new(repository: R, producer: EmailJobProducer, config: InvitationConfig) -> Self {
        Self {
            repository: Arc::new(repository),
            producer,
            resolver: AudienceResolver::new(config.audience_limit),
            config,
        }
    }

    pub fn config(&self) -> &InvitationConfig {
        &self.config
    }

    /// Lazy expiry: a stale `pending`/`decided` row is flipped to `expired` the
    /// first time its token is used after `expires_at`.
    async fn ensure_not_expired(&self, action: &PendingAction, now: DateTime<Utc>) -> InvitationResult<()> {
        match action.status {
            PendingStatus::Expired => Err(InvitationError::Expired),
            PendingStatus::Pending | PendingStatus::Decided if action.is_expired_at(now) => {
                if self.repository.mark_expired(action.id, action.status).await? {
                    tracing::info!(
                        pending_action_id = %action.id,
                        from = %action.status,
                        "Pending action expired"
                    );
                }
                Err(InvitationError::Expired)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ActionSummary, ActionType, Decision, ExecutionResult, PendingPayload, Recipient, SkipCounts, SourceType,
    };
    use crate::repository::MockInvitationRepository;
    use axum_helpers::TenantContext;
    use domain_notifications::{InMemoryJobQueue, TracingAnalyticsSink};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn decided_action(tenant: &TenantContext) -> PendingAction {
        PendingAction {
            id: Uuid::now_v7(),
            workspace_id: tenant.workspace_id,
            owner_user_id: tenant.user_id,
            thread_id: None,
            action_type: ActionType::SendInvites,
            source_type: SourceType::Emails,
            payload: PendingPayload {
                title: "Launch".to_string(),
                inviter_name: "Ada".to_string(),
                list_name: None,
                message: None,
                recipients: vec![Recipient {
                    email: "a@x.com".to_string(),
                    user_id: None,
                }],
                slots: vec![],
            },
            summary: ActionSummary {
                action_type: ActionType::SendInvites,
                title: "Launch".to_string(),
                list_name: None,
                total: 1,
                valid: 1,
                preview: vec![],
                skipped: SkipCounts::default(),
                slots: vec![],
            },
            confirm_token: "tok".to_string(),
            decision: Some(Decision::Send),
            status: PendingStatus::Decided,
            result: None,
            request_id: None,
            execute_request_id: None,
            expires_at: Utc::now() + chrono::Duration::minutes(10),
            decided_at: Some(Utc::now()),
            executed_at: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_execute_that_loses_the_race_replays_the_winner() {
        let tenant = TenantContext::new(Uuid::now_v7(), Uuid::now_v7());
        let decided = decided_action(&tenant);

        let winner_thread = Uuid::now_v7();
        let mut executed = decided.clone();
        executed.status = PendingStatus::Executed;
        executed.thread_id = Some(winner_thread);
        executed.result = Some(ExecutionResult {
            inserted: 1,
            ..Default::default()
        });

        let lookups = AtomicUsize::new(0);
        let mut repo = MockInvitationRepository::new();
        repo.expect_find_by_token().times(2).returning(move |_, _| {
            match lookups.fetch_add(1, Ordering::SeqCst) {
                0 => Ok(Some(decided.clone())),
                _ => Ok(Some(executed.clone())),
            }
        });
        repo.expect_execute().times(1).returning(|_, _, _, _| Ok(None));
        repo.expect_save_result().never();

        let queue = Arc::new(InMemoryJobQueue::new());
        let producer = EmailJobProducer::new(queue.clone(), Arc::new(TracingAnalyticsSink));
        let service = InvitationService::new(repo, producer, InvitationConfig::default());

        let response = service.execute(&tenant, "tok", None).await.unwrap();
        assert_eq!(response.thread_id, winner_thread);
        assert_eq!(response.result.inserted, 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_expired_decided_action_is_flipped_to_expired() {
        let tenant = TenantContext::new(Uuid::now_v7(), Uuid::now_v7());
        let mut action = decided_action(&tenant);
        action.expires_at = Utc::now() - chrono::Duration::seconds(1);
        let id = action.id;

        let mut repo = MockInvitationRepository::new();
        repo.expect_find_by_token()
            .returning(move |_, _| Ok(Some(action.clone())));
        repo.expect_mark_expired()
            .withf(move |action_id, from| *action_id == id && *from == PendingStatus::Decided)
            .times(1)
            .returning(|_, _| Ok(true));
        repo.expect_execute().never();

        let producer = EmailJobProducer::new(Arc::new(InMemoryJobQueue::new()), Arc::new(TracingAnalyticsSink));
        let service = InvitationService::new(repo, producer, InvitationConfig::default());

        let err = service.execute(&tenant, "tok", None).await.unwrap_err();
        assert!(matches!(err, InvitationError::Expired));
    }
}
