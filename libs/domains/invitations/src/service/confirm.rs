use axum_helpers::TenantContext;
use chrono::Utc;
use std::str::FromStr;

use super::InvitationService;
use crate::error::{InvitationError, InvitationResult};
use crate::messages;
use crate::models::{ConfirmResponse, Decision, PendingStatus};
use crate::repository::InvitationRepository;

impl<R: InvitationRepository> InvitationService<R> {
    /// Record the organizer's decision for a staged action. Single use.
    pub async fn confirm(
        &self,
        tenant: &TenantContext,
        confirm_token: &str,
        decision: &str,
    ) -> InvitationResult<ConfirmResponse> {
        let action = self
            .repository
            .find_by_token(tenant, confirm_token)
            .await?
            .ok_or(InvitationError::NotFound)?;

        let now = Utc::now();
        self.ensure_not_expired(&action, now).await?;

        if action.status != PendingStatus::Pending {
            return Err(InvitationError::AlreadyProcessed { status: action.status });
        }

        let decision = Decision::from_str(decision.trim())
            .ok()
            .filter(|d| action.action_type.accepts(*d))
            .ok_or_else(|| InvitationError::InvalidDecision {
                decision: decision.to_string(),
                allowed: action.action_type.allowed_decisions(),
            })?;

        if !self.repository.record_decision(action.id, decision, now).await? {
            // Lost to a concurrent confirm or expiry.
            let status = self
                .repository
                .find_by_token(tenant, confirm_token)
                .await?
                .map(|current| current.status)
                .unwrap_or(PendingStatus::Decided);
            return Err(InvitationError::AlreadyProcessed { status });
        }

        tracing::info!(
            pending_action_id = %action.id,
            decision = %decision,
            "Pending action decided"
        );

        Ok(ConfirmResponse {
            decision,
            can_execute: decision.can_execute(),
            message_for_chat: messages::decided(decision, &action.summary),
        })
    }
}
