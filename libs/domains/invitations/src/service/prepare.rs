use axum_helpers::TenantContext;
use chrono::Utc;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::InvitationService;
use crate::audience::exclude_already_invited;
use crate::error::{InvitationError, InvitationResult};
use crate::messages;
use crate::models::{
    ActionSummary, ActionType, NewPendingAction, PREVIEW_LIMIT, PendingPayload, PrepareInvitesRequest,
    PrepareResponse, PrepareSlotsRequest, PreviewEntry, Recipient, SkipCounts, SourceType, ThreadRef,
};
use crate::repository::InvitationRepository;
use crate::token;

/// Title used when neither the request nor the list names the thread.
const DEFAULT_THREAD_TITLE: &str = "New thread";
const DEFAULT_INVITER_NAME: &str = "Your organizer";

/// Resolved addresses before recipients are looked up.
struct Audience {
    total: usize,
    valid: Vec<String>,
    skipped: SkipCounts,
    list_name: Option<String>,
}

impl<R: InvitationRepository> InvitationService<R> {
    /// Stage invites to a thread that execute will create.
    pub async fn prepare_send(
        &self,
        tenant: &TenantContext,
        input: PrepareInvitesRequest,
        request_id: Option<String>,
    ) -> InvitationResult<PrepareResponse> {
        input
            .validate()
            .map_err(|e| InvitationError::Validation(e.to_string()))?;

        let (source_type, audience) = self.resolve_audience(tenant, &input).await?;
        let title = input
            .title
            .clone()
            .or_else(|| audience.list_name.clone())
            .unwrap_or_else(|| DEFAULT_THREAD_TITLE.to_string());

        self.stage_invites(
            tenant,
            ActionType::SendInvites,
            source_type,
            None,
            title,
            audience,
            input.message,
            request_id,
        )
        .await
    }

    /// Stage invites to an existing thread. Addresses already invited there are
    /// dropped and counted as `already_invited`.
    pub async fn prepare_thread_invites(
        &self,
        tenant: &TenantContext,
        thread_id: Uuid,
        input: PrepareInvitesRequest,
        request_id: Option<String>,
    ) -> InvitationResult<PrepareResponse> {
        input
            .validate()
            .map_err(|e| InvitationError::Validation(e.to_string()))?;

        let thread = self.find_thread(tenant, thread_id).await?;
        let (source_type, mut audience) = self.resolve_audience(tenant, &input).await?;

        let invited = self.repository.invited_emails(thread.id).await?;
        let (remaining, already_invited) = exclude_already_invited(audience.valid, &invited);
        audience.valid = remaining;
        audience.skipped.already_invited = already_invited;

        self.stage_invites(
            tenant,
            ActionType::AddInvites,
            source_type,
            Some(thread.id),
            thread.title,
            audience,
            input.message,
            request_id,
        )
        .await
    }

    /// Stage additional time slots for an existing thread.
    pub async fn prepare_slots(
        &self,
        tenant: &TenantContext,
        thread_id: Uuid,
        input: PrepareSlotsRequest,
        request_id: Option<String>,
    ) -> InvitationResult<PrepareResponse> {
        input
            .validate()
            .map_err(|e| InvitationError::Validation(e.to_string()))?;

        let thread = self.find_thread(tenant, thread_id).await?;

        let total = input.slots.len();
        let mut slots = Vec::with_capacity(total);
        for slot in input.slots {
            if !slots.contains(&slot) {
                slots.push(slot);
            }
        }
        let skipped = SkipCounts {
            duplicate_input: total - slots.len(),
            ..Default::default()
        };

        let summary = ActionSummary {
            action_type: ActionType::AddSlots,
            title: thread.title.clone(),
            list_name: None,
            total,
            valid: slots.len(),
            preview: vec![],
            skipped,
            slots: slots.clone(),
        };
        let payload = PendingPayload {
            title: thread.title,
            inviter_name: self.inviter_name(tenant).await?,
            list_name: None,
            message: None,
            recipients: vec![],
            slots,
        };

        self.stage(
            tenant,
            ActionType::AddSlots,
            SourceType::Slots,
            Some(thread.id),
            payload,
            summary,
            request_id,
        )
        .await
    }

    async fn find_thread(&self, tenant: &TenantContext, thread_id: Uuid) -> InvitationResult<ThreadRef> {
        self.repository
            .find_thread(tenant, thread_id)
            .await?
            .ok_or(InvitationError::ThreadNotFound(thread_id))
    }

    async fn inviter_name(&self, tenant: &TenantContext) -> InvitationResult<String> {
        Ok(self
            .repository
            .display_name(tenant.user_id)
            .await?
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_INVITER_NAME.to_string()))
    }

    async fn resolve_audience(
        &self,
        tenant: &TenantContext,
        input: &PrepareInvitesRequest,
    ) -> InvitationResult<(SourceType, Audience)> {
        let source_type = match SourceType::from_str(&input.source_type) {
            Ok(source @ (SourceType::Emails | SourceType::List)) => source,
            _ => return Err(InvitationError::InvalidSourceType(input.source_type.clone())),
        };

        let audience = match source_type {
            SourceType::List => {
                let list_id = input.list_id.ok_or_else(|| {
                    InvitationError::Validation("list_id is required when source_type is list".to_string())
                })?;
                let list = self
                    .repository
                    .find_contact_list(tenant, list_id)
                    .await?
                    .ok_or(InvitationError::ListNotFound(list_id))?;
                let resolved = self.resolver.resolve_list(&list)?;

                let mut skipped = SkipCounts::from(&resolved.emails);
                skipped.missing_email = resolved.missing_email_count;
                Audience {
                    total: resolved.total,
                    valid: resolved.emails.valid,
                    skipped,
                    list_name: Some(resolved.list_name),
                }
            }
            _ => {
                let emails = input.emails.as_deref().unwrap_or_default();
                let resolved = self.resolver.resolve_emails(emails)?;
                Audience {
                    total: resolved.total(),
                    skipped: SkipCounts::from(&resolved),
                    valid: resolved.valid,
                    list_name: None,
                }
            }
        };

        Ok((source_type, audience))
    }

    #[allow(clippy::too_many_arguments)]
    async fn stage_invites(
        &self,
        tenant: &TenantContext,
        action_type: ActionType,
        source_type: SourceType,
        thread_id: Option<Uuid>,
        title: String,
        audience: Audience,
        message: Option<String>,
        request_id: Option<String>,
    ) -> InvitationResult<PrepareResponse> {
        if audience.valid.is_empty() {
            return Err(InvitationError::NoValidEmails {
                total: audience.total,
                skipped: audience.skipped,
            });
        }

        let users = self.repository.find_users_by_emails(&audience.valid).await?;
        let recipients: Vec<Recipient> = audience
            .valid
            .into_iter()
            .map(|email| Recipient {
                user_id: users.get(&email).copied(),
                email,
            })
            .collect();

        let summary = ActionSummary {
            action_type,
            title: title.clone(),
            list_name: audience.list_name.clone(),
            total: audience.total,
            valid: recipients.len(),
            preview: recipients
                .iter()
                .take(PREVIEW_LIMIT)
                .map(|r| PreviewEntry {
                    email: r.email.clone(),
                    is_existing_user: r.user_id.is_some(),
                })
                .collect(),
            skipped: audience.skipped,
            slots: vec![],
        };
        let payload = PendingPayload {
            title,
            inviter_name: self.inviter_name(tenant).await?,
            list_name: audience.list_name,
            message: message.filter(|m| !m.trim().is_empty()),
            recipients,
            slots: vec![],
        };

        self.stage(tenant, action_type, source_type, thread_id, payload, summary, request_id)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn stage(
        &self,
        tenant: &TenantContext,
        action_type: ActionType,
        source_type: SourceType,
        thread_id: Option<Uuid>,
        payload: PendingPayload,
        summary: ActionSummary,
        request_id: Option<String>,
    ) -> InvitationResult<PrepareResponse> {
        let action = self
            .repository
            .create_pending_action(NewPendingAction {
                workspace_id: tenant.workspace_id,
                owner_user_id: tenant.user_id,
                thread_id,
                action_type,
                source_type,
                payload,
                summary,
                confirm_token: token::confirm_token(),
                request_id,
                expires_at: Utc::now() + self.config.pending_action_ttl,
            })
            .await?;

        tracing::info!(
            pending_action_id = %action.id,
            action_type = %action.action_type,
            valid = action.summary.valid,
            skipped = action.summary.skipped.total(),
            "Staged pending action"
        );

        Ok(PrepareResponse {
            pending_action_id: action.id,
            message_for_chat: messages::prepared(&action.summary),
            confirm_token: action.confirm_token,
            expires_at: action.expires_at,
            summary: action.summary,
        })
    }
}
