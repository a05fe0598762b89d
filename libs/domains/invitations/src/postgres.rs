use async_trait::async_trait;
use axum_helpers::TenantContext;
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr,
    EntityTrait, QueryFilter, QueryOrder, SqlErr, Statement, TransactionTrait, Value,
};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::entity::{
    contact_list, contact_list_member, notification, pending_action, thread, thread_invite, thread_slot, user,
};
use crate::error::{InvitationError, InvitationResult};
use crate::models::{
    ContactList, Decision, ExecutedBatch, ExecutionResult, ExecutionWork, InviteRef, NewPendingAction,
    PendingAction, PendingStatus, Recipient, SlotInput, ThreadRef,
};
use crate::repository::InvitationRepository;
use crate::token;

pub struct PgInvitationRepository {
    db: DatabaseConnection,
}

impl PgInvitationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

async fn insert_invite(
    txn: &DatabaseTransaction,
    action: &PendingAction,
    thread_id: Uuid,
    thread_title: &str,
    recipient: &Recipient,
    now: DateTime<Utc>,
) -> Result<InviteRef, DbErr> {
    let invite = thread_invite::ActiveModel {
        id: Set(Uuid::now_v7()),
        thread_id: Set(thread_id),
        email: Set(recipient.email.clone()),
        email_normalized: Set(recipient.email.to_lowercase()),
        user_id: Set(recipient.user_id),
        token: Set(token::invite_token()),
        status: Set("pending".to_string()),
        provider_id: Set(None),
        sent_at: Set(None),
        created_at: Set(now.into()),
    }
    .insert(txn)
    .await?;

    if let Some(user_id) = invite.user_id {
        notification::ActiveModel {
            id: Set(Uuid::now_v7()),
            user_id: Set(user_id),
            workspace_id: Set(action.workspace_id),
            kind: Set(notification::KIND_THREAD_INVITE.to_string()),
            thread_id: Set(Some(thread_id)),
            invite_id: Set(Some(invite.id)),
            payload: Set(json!({
                "thread_title": thread_title,
                "inviter_name": action.payload.inviter_name,
            })),
            read_at: Set(None),
            created_at: Set(now.into()),
        }
        .insert(txn)
        .await?;
    }

    Ok(invite.into())
}

async fn insert_slot(
    txn: &DatabaseTransaction,
    thread_id: Uuid,
    slot: &SlotInput,
    now: DateTime<Utc>,
) -> Result<(), DbErr> {
    thread_slot::ActiveModel {
        id: Set(Uuid::now_v7()),
        thread_id: Set(thread_id),
        start_at: Set(slot.start.into()),
        end_at: Set(slot.end.into()),
        created_at: Set(now.into()),
    }
    .insert(txn)
    .await?;
    Ok(())
}

impl PgInvitationRepository {
    async fn execute_invites(
        &self,
        txn: &DatabaseTransaction,
        action: &PendingAction,
        thread_id: Option<Uuid>,
        title: String,
        recipients: Vec<Recipient>,
        now: DateTime<Utc>,
    ) -> InvitationResult<ExecutedBatch> {
        let (thread_id, thread_title) = match thread_id {
            Some(id) => {
                let thread = thread::Entity::find_by_id(id)
                    .one(txn)
                    .await?
                    .ok_or(InvitationError::ThreadNotFound(id))?;
                (thread.id, thread.title)
            }
            None => {
                let thread = thread::ActiveModel {
                    id: Set(Uuid::now_v7()),
                    workspace_id: Set(action.workspace_id),
                    owner_user_id: Set(action.owner_user_id),
                    title: Set(title),
                    status: Set("open".to_string()),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                }
                .insert(txn)
                .await?;
                tracing::info!(thread_id = %thread.id, pending_action_id = %action.id, "Created thread");
                (thread.id, thread.title)
            }
        };

        let mut result = ExecutionResult::default();
        let mut invites = Vec::with_capacity(recipients.len());

        for recipient in &recipients {
            let savepoint = txn.begin().await?;
            match insert_invite(&savepoint, action, thread_id, &thread_title, recipient, now).await {
                Ok(invite) => {
                    savepoint.commit().await?;
                    if invite.user_id.is_some() {
                        result.deliveries.in_app_created += 1;
                    }
                    invites.push(invite);
                    result.inserted += 1;
                }
                Err(e) => {
                    savepoint.rollback().await?;
                    if is_unique_violation(&e) {
                        result.skipped += 1;
                    } else {
                        tracing::warn!(
                            pending_action_id = %action.id,
                            email = %recipient.email,
                            error = %e,
                            "Invite insert failed"
                        );
                        result.failed += 1;
                    }
                }
            }
        }

        Ok(ExecutedBatch {
            thread_id,
            thread_title,
            invites,
            result,
        })
    }

    async fn execute_slots(
        &self,
        txn: &DatabaseTransaction,
        action: &PendingAction,
        thread_id: Uuid,
        slots: Vec<SlotInput>,
        now: DateTime<Utc>,
    ) -> InvitationResult<ExecutedBatch> {
        let thread = thread::Entity::find_by_id(thread_id)
            .one(txn)
            .await?
            .ok_or(InvitationError::ThreadNotFound(thread_id))?;

        let mut result = ExecutionResult::default();
        for slot in &slots {
            let savepoint = txn.begin().await?;
            match insert_slot(&savepoint, thread_id, slot, now).await {
                Ok(()) => {
                    savepoint.commit().await?;
                    result.inserted += 1;
                }
                Err(e) => {
                    savepoint.rollback().await?;
                    if is_unique_violation(&e) {
                        result.skipped += 1;
                    } else {
                        tracing::warn!(pending_action_id = %action.id, error = %e, "Slot insert failed");
                        result.failed += 1;
                    }
                }
            }
        }

        let invites = thread_invite::Entity::find()
            .filter(thread_invite::Column::ThreadId.eq(thread_id))
            .order_by_asc(thread_invite::Column::CreatedAt)
            .all(txn)
            .await?
            .into_iter()
            .map(InviteRef::from)
            .collect();

        Ok(ExecutedBatch {
            thread_id,
            thread_title: thread.title,
            invites,
            result,
        })
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> InvitationResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| InvitationError::Internal(format!("Serialization error: {}", e)))
}

#[async_trait]
impl InvitationRepository for PgInvitationRepository {
    async fn find_users_by_emails(&self, emails: &[String]) -> InvitationResult<HashMap<String, Uuid>> {
        if emails.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders: Vec<String> = (1..=emails.len()).map(|i| format!("${}", i)).collect();
        let sql = format!(
            "SELECT id, lower(email) AS email FROM users WHERE lower(email) IN ({})",
            placeholders.join(", ")
        );
        let values = emails.iter().map(|e| Value::from(e.to_lowercase()));
        let rows = self
            .db
            .query_all_raw(Statement::from_sql_and_values(DbBackend::Postgres, sql, values))
            .await?;

        let mut users = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.try_get("", "id")?;
            let email: String = row.try_get("", "email")?;
            users.insert(email, id);
        }
        Ok(users)
    }

    async fn display_name(&self, user_id: Uuid) -> InvitationResult<Option<String>> {
        let user = user::Entity::find_by_id(user_id).one(&self.db).await?;
        Ok(user.map(|u| u.display_name))
    }

    async fn find_contact_list(
        &self,
        tenant: &TenantContext,
        list_id: Uuid,
    ) -> InvitationResult<Option<ContactList>> {
        let Some(list) = contact_list::Entity::find_by_id(list_id)
            .filter(contact_list::Column::WorkspaceId.eq(tenant.workspace_id))
            .filter(contact_list::Column::OwnerUserId.eq(tenant.user_id))
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        let members = contact_list_member::Entity::find()
            .filter(contact_list_member::Column::ListId.eq(list.id))
            .order_by_asc(contact_list_member::Column::CreatedAt)
            .all(&self.db)
            .await?;

        Ok(Some(ContactList {
            id: list.id,
            name: list.name,
            members: members.into_iter().map(Into::into).collect(),
        }))
    }

    async fn find_thread(&self, tenant: &TenantContext, thread_id: Uuid) -> InvitationResult<Option<ThreadRef>> {
        let thread = thread::Entity::find_by_id(thread_id)
            .filter(thread::Column::WorkspaceId.eq(tenant.workspace_id))
            .filter(thread::Column::OwnerUserId.eq(tenant.user_id))
            .one(&self.db)
            .await?;
        Ok(thread.map(Into::into))
    }

    async fn invited_emails(&self, thread_id: Uuid) -> InvitationResult<HashSet<String>> {
        let invites = thread_invite::Entity::find()
            .filter(thread_invite::Column::ThreadId.eq(thread_id))
            .all(&self.db)
            .await?;
        Ok(invites.into_iter().map(|i| i.email_normalized).collect())
    }

    async fn create_pending_action(&self, input: NewPendingAction) -> InvitationResult<PendingAction> {
        let now = Utc::now();
        let model = pending_action::ActiveModel {
            id: Set(Uuid::now_v7()),
            workspace_id: Set(input.workspace_id),
            owner_user_id: Set(input.owner_user_id),
            thread_id: Set(input.thread_id),
            action_type: Set(input.action_type),
            source_type: Set(input.source_type),
            payload: Set(to_json(&input.payload)?),
            summary: Set(to_json(&input.summary)?),
            confirm_token: Set(input.confirm_token),
            decision: Set(None),
            status: Set(PendingStatus::Pending),
            result: Set(None),
            request_id: Set(input.request_id),
            execute_request_id: Set(None),
            expires_at: Set(input.expires_at.into()),
            decided_at: Set(None),
            executed_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&self.db)
        .await?;

        tracing::info!(pending_action_id = %model.id, "Created pending action");
        model.try_into()
    }

    async fn find_by_token(&self, tenant: &TenantContext, token: &str) -> InvitationResult<Option<PendingAction>> {
        pending_action::Entity::find()
            .filter(pending_action::Column::ConfirmToken.eq(token))
            .filter(pending_action::Column::WorkspaceId.eq(tenant.workspace_id))
            .filter(pending_action::Column::OwnerUserId.eq(tenant.user_id))
            .one(&self.db)
            .await?
            .map(PendingAction::try_from)
            .transpose()
    }

    async fn record_decision(&self, id: Uuid, decision: Decision, now: DateTime<Utc>) -> InvitationResult<bool> {
        let updated = pending_action::Entity::update_many()
            .col_expr(pending_action::Column::Status, Expr::value(PendingStatus::Decided))
            .col_expr(pending_action::Column::Decision, Expr::value(decision))
            .col_expr(pending_action::Column::DecidedAt, Expr::value(now))
            .filter(pending_action::Column::Id.eq(id))
            .filter(pending_action::Column::Status.eq(PendingStatus::Pending))
            .exec(&self.db)
            .await?;
        Ok(updated.rows_affected == 1)
    }

    async fn mark_expired(&self, id: Uuid, from: PendingStatus) -> InvitationResult<bool> {
        if !from.can_transition_to(PendingStatus::Expired) {
            return Ok(false);
        }
        let updated = pending_action::Entity::update_many()
            .col_expr(pending_action::Column::Status, Expr::value(PendingStatus::Expired))
            .filter(pending_action::Column::Id.eq(id))
            .filter(pending_action::Column::Status.eq(from))
            .exec(&self.db)
            .await?;
        Ok(updated.rows_affected == 1)
    }

    async fn execute(
        &self,
        action: &PendingAction,
        work: ExecutionWork,
        execute_request_id: Option<String>,
        now: DateTime<Utc>,
    ) -> InvitationResult<Option<ExecutedBatch>> {
        let txn = self.db.begin().await?;

        // Row lock taken here; a concurrent execute waits, then sees `executed`.
        let flipped = pending_action::Entity::update_many()
            .col_expr(pending_action::Column::Status, Expr::value(PendingStatus::Executed))
            .col_expr(pending_action::Column::ExecutedAt, Expr::value(now))
            .col_expr(pending_action::Column::ExecuteRequestId, Expr::value(execute_request_id))
            .filter(pending_action::Column::Id.eq(action.id))
            .filter(pending_action::Column::Status.eq(PendingStatus::Decided))
            .exec(&txn)
            .await?;

        if flipped.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(None);
        }

        let batch = match work {
            ExecutionWork::Invites {
                thread_id,
                title,
                recipients,
            } => {
                self.execute_invites(&txn, action, thread_id, title, recipients, now)
                    .await?
            }
            ExecutionWork::Slots { thread_id, slots } => {
                self.execute_slots(&txn, action, thread_id, slots, now).await?
            }
        };

        pending_action::Entity::update_many()
            .col_expr(pending_action::Column::ThreadId, Expr::value(batch.thread_id))
            .col_expr(pending_action::Column::Result, Expr::value(to_json(&batch.result)?))
            .filter(pending_action::Column::Id.eq(action.id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(Some(batch))
    }

    async fn save_result(&self, id: Uuid, result: &ExecutionResult) -> InvitationResult<()> {
        let updated = pending_action::Entity::update_many()
            .col_expr(pending_action::Column::Result, Expr::value(to_json(result)?))
            .filter(pending_action::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        if updated.rows_affected == 0 {
            return Err(InvitationError::NotFound);
        }
        Ok(())
    }
}
