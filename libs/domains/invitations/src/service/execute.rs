use axum_helpers::TenantContext;
use chrono::Utc;
use domain_notifications::{AdditionalSlotsData, InviteData, SlotSummary};

use super::InvitationService;
use crate::error::{InvitationError, InvitationResult};
use crate::messages;
use crate::models::{
    ActionType, Decision, ExecutedBatch, ExecuteResponse, ExecutionWork, PendingAction, PendingStatus,
};
use crate::repository::InvitationRepository;

impl<R: InvitationRepository> InvitationService<R> {
    /// Run a decided action once. Repeat calls return the recorded result
    /// without writing or queueing anything.
    pub async fn execute(
        &self,
        tenant: &TenantContext,
        confirm_token: &str,
        request_id: Option<String>,
    ) -> InvitationResult<ExecuteResponse> {
        let action = self
            .repository
            .find_by_token(tenant, confirm_token)
            .await?
            .ok_or(InvitationError::NotFound)?;

        if action.status == PendingStatus::Executed {
            return replay(&action);
        }

        let now = Utc::now();
        self.ensure_not_expired(&action, now).await?;

        let decision = match (action.status, action.decision) {
            (PendingStatus::Decided, Some(Decision::Cancel)) => return Err(InvitationError::Cancelled),
            (PendingStatus::Decided, Some(decision)) => decision,
            _ => return Err(InvitationError::NotConfirmed),
        };

        let work = match action.action_type {
            ActionType::AddSlots => ExecutionWork::Slots {
                thread_id: action.thread_id.ok_or_else(|| {
                    InvitationError::Internal(format!("pending action {} has no thread", action.id))
                })?,
                slots: action.payload.slots.clone(),
            },
            ActionType::SendInvites | ActionType::AddInvites => ExecutionWork::Invites {
                thread_id: match decision {
                    Decision::NewThread => None,
                    _ => action.thread_id,
                },
                title: action.payload.title.clone(),
                recipients: action.payload.recipients.clone(),
            },
        };

        let Some(batch) = self.repository.execute(&action, work, request_id, now).await? else {
            // Another execute flipped the row first; answer with its result.
            let current = self
                .repository
                .find_by_token(tenant, confirm_token)
                .await?
                .ok_or(InvitationError::NotFound)?;
            return match current.status {
                PendingStatus::Executed => replay(&current),
                PendingStatus::Expired => Err(InvitationError::Expired),
                status => Err(InvitationError::AlreadyProcessed { status }),
            };
        };

        let mut result = batch.result;
        result.deliveries.email_queued = self.enqueue_emails(&action, &batch).await;

        if let Err(e) = self.repository.save_result(action.id, &result).await {
            tracing::error!(pending_action_id = %action.id, error = %e, "Failed to store execution result");
        }

        tracing::info!(
            pending_action_id = %action.id,
            thread_id = %batch.thread_id,
            inserted = result.inserted,
            skipped = result.skipped,
            failed = result.failed,
            email_queued = result.deliveries.email_queued,
            in_app_created = result.deliveries.in_app_created,
            "Executed pending action"
        );

        Ok(ExecuteResponse {
            thread_id: batch.thread_id,
            message_for_chat: messages::executed(action.action_type, &batch.thread_title, &result),
            result,
        })
    }

    /// One job per invite in the batch. A failed publish is logged and left out
    /// of the count; the committed rows stay.
    async fn enqueue_emails(&self, action: &PendingAction, batch: &ExecutedBatch) -> usize {
        let payload = &action.payload;
        let mut queued = 0;

        for invite in &batch.invites {
            let invite_url = self.config.invite_url(&invite.token);
            let published = match action.action_type {
                ActionType::AddSlots => {
                    let data = AdditionalSlotsData {
                        invite_id: invite.id,
                        thread_id: batch.thread_id,
                        thread_title: batch.thread_title.clone(),
                        organizer_name: payload.inviter_name.clone(),
                        slots: payload
                            .slots
                            .iter()
                            .map(|slot| SlotSummary {
                                start_at: slot.start,
                                end_at: slot.end,
                            })
                            .collect(),
                        invite_url,
                    };
                    self.producer.enqueue_additional_slots(&invite.email, data).await
                }
                ActionType::SendInvites | ActionType::AddInvites => {
                    let data = InviteData {
                        invite_id: invite.id,
                        thread_id: batch.thread_id,
                        thread_title: batch.thread_title.clone(),
                        inviter_name: payload.inviter_name.clone(),
                        invite_url,
                        message: payload.message.clone(),
                    };
                    self.producer.enqueue_invite(&invite.email, data).await
                }
            };

            match published {
                Ok(_) => queued += 1,
                Err(e) => tracing::error!(
                    pending_action_id = %action.id,
                    invite_id = %invite.id,
                    error = %e,
                    "Failed to enqueue email job"
                ),
            }
        }

        queued
    }
}

fn replay(action: &PendingAction) -> InvitationResult<ExecuteResponse> {
    let (Some(thread_id), Some(result)) = (action.thread_id, action.result) else {
        return Err(InvitationError::Internal(format!(
            "executed pending action {} has no stored result",
            action.id
        )));
    };

    tracing::debug!(pending_action_id = %action.id, "Replaying execution result");
    Ok(ExecuteResponse {
        thread_id,
        result,
        message_for_chat: messages::executed(action.action_type, &action.payload.title, &result),
    })
}
