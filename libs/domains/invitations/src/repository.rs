use async_trait::async_trait;
use axum_helpers::TenantContext;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::audience::normalize_email;
use crate::error::{InvitationError, InvitationResult};
use crate::models::{
    ContactList, ContactMember, Decision, DeliveryCounts, ExecutedBatch, ExecutionResult,
    ExecutionWork, InviteRef, NewPendingAction, PendingAction, PendingStatus, SlotInput, ThreadRef,
};
use crate::token;

/// Persistence for pending actions and the thread rows execute writes.
///
/// Status changes are compare-and-set: they only apply when the row is still
/// in the expected prior status and report whether they did.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InvitationRepository: Send + Sync {
    /// Platform users among `emails` (normalized), keyed by normalized email.
    async fn find_users_by_emails(&self, emails: &[String]) -> InvitationResult<HashMap<String, Uuid>>;

    async fn display_name(&self, user_id: Uuid) -> InvitationResult<Option<String>>;

    async fn find_contact_list(
        &self,
        tenant: &TenantContext,
        list_id: Uuid,
    ) -> InvitationResult<Option<ContactList>>;

    async fn find_thread(&self, tenant: &TenantContext, thread_id: Uuid) -> InvitationResult<Option<ThreadRef>>;

    /// Normalized addresses already invited to the thread.
    async fn invited_emails(&self, thread_id: Uuid) -> InvitationResult<HashSet<String>>;

    async fn create_pending_action(&self, input: NewPendingAction) -> InvitationResult<PendingAction>;

    async fn find_by_token(&self, tenant: &TenantContext, token: &str) -> InvitationResult<Option<PendingAction>>;

    /// `pending → decided`.
    async fn record_decision(&self, id: Uuid, decision: Decision, now: DateTime<Utc>) -> InvitationResult<bool>;

    /// `from → expired`.
    async fn mark_expired(&self, id: Uuid, from: PendingStatus) -> InvitationResult<bool>;

    /// Flip `decided → executed` and perform `work`, all in one transaction.
    ///
    /// Returns `None` when the row was no longer `decided` (another execute won).
    /// Per-row unique violations count as skipped, other row errors as failed;
    /// neither aborts the batch.
    async fn execute(
        &self,
        action: &PendingAction,
        work: ExecutionWork,
        execute_request_id: Option<String>,
        now: DateTime<Utc>,
    ) -> InvitationResult<Option<ExecutedBatch>>;

    /// Overwrite the stored result once delivery jobs are queued.
    async fn save_result(&self, id: Uuid, result: &ExecutionResult) -> InvitationResult<()>;
}

#[derive(Debug, Clone)]
struct ThreadRow {
    workspace_id: Uuid,
    owner_user_id: Uuid,
    title: String,
}

#[derive(Debug, Clone)]
struct InviteRow {
    thread_id: Uuid,
    invite: InviteRef,
}

#[derive(Debug, Clone)]
struct ListRow {
    workspace_id: Uuid,
    owner_user_id: Uuid,
    list: ContactList,
}

/// In-app notification created for an existing user at execute time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InAppNotification {
    pub user_id: Uuid,
    pub workspace_id: Uuid,
    pub thread_id: Uuid,
    pub invite_id: Uuid,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, (String, String)>,
    lists: HashMap<Uuid, ListRow>,
    threads: HashMap<Uuid, ThreadRow>,
    invites: Vec<InviteRow>,
    slots: Vec<(Uuid, SlotInput)>,
    notifications: Vec<InAppNotification>,
    actions: HashMap<Uuid, PendingAction>,
    /// Addresses whose invite insert is made to fail.
    failing_emails: HashSet<String>,
}

/// In-memory implementation of InvitationRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryInvitationRepository {
    state: Arc<RwLock<State>>,
}

impl InMemoryInvitationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, email: &str, display_name: &str) -> Uuid {
        let id = Uuid::now_v7();
        self.state
            .write()
            .await
            .users
            .insert(id, (normalize_email(email), display_name.to_string()));
        id
    }

    pub async fn add_thread(&self, tenant: &TenantContext, title: &str) -> Uuid {
        let id = Uuid::now_v7();
        self.state.write().await.threads.insert(
            id,
            ThreadRow {
                workspace_id: tenant.workspace_id,
                owner_user_id: tenant.user_id,
                title: title.to_string(),
            },
        );
        id
    }

    pub async fn add_invite(&self, thread_id: Uuid, email: &str) -> Uuid {
        let id = Uuid::now_v7();
        self.state.write().await.invites.push(InviteRow {
            thread_id,
            invite: InviteRef {
                id,
                email: normalize_email(email),
                token: token::invite_token(),
                user_id: None,
            },
        });
        id
    }

    pub async fn add_contact_list(&self, tenant: &TenantContext, name: &str, emails: &[Option<&str>]) -> Uuid {
        let id = Uuid::now_v7();
        let list = ContactList {
            id,
            name: name.to_string(),
            members: emails
                .iter()
                .map(|email| ContactMember {
                    name: None,
                    email: email.map(String::from),
                })
                .collect(),
        };
        self.state.write().await.lists.insert(
            id,
            ListRow {
                workspace_id: tenant.workspace_id,
                owner_user_id: tenant.user_id,
                list,
            },
        );
        id
    }

    /// Make every later invite insert for `email` fail with a non-unique error.
    pub async fn fail_inserts_for(&self, email: &str) {
        self.state.write().await.failing_emails.insert(normalize_email(email));
    }

    pub async fn set_expires_at(&self, id: Uuid, expires_at: DateTime<Utc>) {
        if let Some(action) = self.state.write().await.actions.get_mut(&id) {
            action.expires_at = expires_at;
        }
    }

    pub async fn pending_action(&self, id: Uuid) -> Option<PendingAction> {
        self.state.read().await.actions.get(&id).cloned()
    }

    pub async fn thread_count(&self) -> usize {
        self.state.read().await.threads.len()
    }

    pub async fn invites_for(&self, thread_id: Uuid) -> Vec<InviteRef> {
        self.state
            .read()
            .await
            .invites
            .iter()
            .filter(|row| row.thread_id == thread_id)
            .map(|row| row.invite.clone())
            .collect()
    }

    pub async fn invite_count(&self) -> usize {
        self.state.read().await.invites.len()
    }

    pub async fn slots_for(&self, thread_id: Uuid) -> Vec<SlotInput> {
        self.state
            .read()
            .await
            .slots
            .iter()
            .filter(|(id, _)| *id == thread_id)
            .map(|(_, slot)| *slot)
            .collect()
    }

    pub async fn notifications(&self) -> Vec<InAppNotification> {
        self.state.read().await.notifications.clone()
    }
}

fn owned_by(tenant: &TenantContext, workspace_id: Uuid, owner_user_id: Uuid) -> bool {
    tenant.workspace_id == workspace_id && tenant.user_id == owner_user_id
}

#[async_trait]
impl InvitationRepository for InMemoryInvitationRepository {
    async fn find_users_by_emails(&self, emails: &[String]) -> InvitationResult<HashMap<String, Uuid>> {
        let wanted: HashSet<String> = emails.iter().map(|e| normalize_email(e)).collect();
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .filter(|(_, (email, _))| wanted.contains(email))
            .map(|(id, (email, _))| (email.clone(), *id))
            .collect())
    }

    async fn display_name(&self, user_id: Uuid) -> InvitationResult<Option<String>> {
        let state = self.state.read().await;
        Ok(state.users.get(&user_id).map(|(_, name)| name.clone()))
    }

    async fn find_contact_list(
        &self,
        tenant: &TenantContext,
        list_id: Uuid,
    ) -> InvitationResult<Option<ContactList>> {
        let state = self.state.read().await;
        Ok(state
            .lists
            .get(&list_id)
            .filter(|row| owned_by(tenant, row.workspace_id, row.owner_user_id))
            .map(|row| row.list.clone()))
    }

    async fn find_thread(&self, tenant: &TenantContext, thread_id: Uuid) -> InvitationResult<Option<ThreadRef>> {
        let state = self.state.read().await;
        Ok(state
            .threads
            .get(&thread_id)
            .filter(|row| owned_by(tenant, row.workspace_id, row.owner_user_id))
            .map(|row| ThreadRef {
                id: thread_id,
                title: row.title.clone(),
            }))
    }

    async fn invited_emails(&self, thread_id: Uuid) -> InvitationResult<HashSet<String>> {
        let state = self.state.read().await;
        Ok(state
            .invites
            .iter()
            .filter(|row| row.thread_id == thread_id)
            .map(|row| normalize_email(&row.invite.email))
            .collect())
    }

    async fn create_pending_action(&self, input: NewPendingAction) -> InvitationResult<PendingAction> {
        let mut state = self.state.write().await;
        if state.actions.values().any(|a| a.confirm_token == input.confirm_token) {
            return Err(InvitationError::Internal("confirm token collision".to_string()));
        }

        let action = PendingAction {
            id: Uuid::now_v7(),
            workspace_id: input.workspace_id,
            owner_user_id: input.owner_user_id,
            thread_id: input.thread_id,
            action_type: input.action_type,
            source_type: input.source_type,
            payload: input.payload,
            summary: input.summary,
            confirm_token: input.confirm_token,
            decision: None,
            status: PendingStatus::Pending,
            result: None,
            request_id: input.request_id,
            execute_request_id: None,
            expires_at: input.expires_at,
            decided_at: None,
            executed_at: None,
            created_at: Utc::now(),
        };
        state.actions.insert(action.id, action.clone());

        tracing::info!(pending_action_id = %action.id, "Created pending action");
        Ok(action)
    }

    async fn find_by_token(&self, tenant: &TenantContext, token: &str) -> InvitationResult<Option<PendingAction>> {
        let state = self.state.read().await;
        Ok(state
            .actions
            .values()
            .find(|a| a.confirm_token == token && owned_by(tenant, a.workspace_id, a.owner_user_id))
            .cloned())
    }

    async fn record_decision(&self, id: Uuid, decision: Decision, now: DateTime<Utc>) -> InvitationResult<bool> {
        let mut state = self.state.write().await;
        match state.actions.get_mut(&id) {
            Some(action) if action.status == PendingStatus::Pending => {
                action.status = PendingStatus::Decided;
                action.decision = Some(decision);
                action.decided_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_expired(&self, id: Uuid, from: PendingStatus) -> InvitationResult<bool> {
        let mut state = self.state.write().await;
        match state.actions.get_mut(&id) {
            Some(action) if action.status == from && from.can_transition_to(PendingStatus::Expired) => {
                action.status = PendingStatus::Expired;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn execute(
        &self,
        action: &PendingAction,
        work: ExecutionWork,
        execute_request_id: Option<String>,
        now: DateTime<Utc>,
    ) -> InvitationResult<Option<ExecutedBatch>> {
        // One write guard for the whole batch stands in for the transaction.
        let mut state = self.state.write().await;

        match state.actions.get(&action.id) {
            Some(current) if current.status == PendingStatus::Decided => {}
            _ => return Ok(None),
        }

        let batch = match work {
            ExecutionWork::Invites {
                thread_id,
                title,
                recipients,
            } => {
                let (thread_id, thread_title) = match thread_id {
                    Some(id) => {
                        let row = state.threads.get(&id).ok_or(InvitationError::ThreadNotFound(id))?;
                        (id, row.title.clone())
                    }
                    None => {
                        let id = Uuid::now_v7();
                        state.threads.insert(
                            id,
                            ThreadRow {
                                workspace_id: action.workspace_id,
                                owner_user_id: action.owner_user_id,
                                title: title.clone(),
                            },
                        );
                        (id, title)
                    }
                };

                let mut result = ExecutionResult::default();
                let mut invites = Vec::new();
                for recipient in recipients {
                    let email = normalize_email(&recipient.email);
                    if state.failing_emails.contains(&email) {
                        result.failed += 1;
                        continue;
                    }
                    let exists = state
                        .invites
                        .iter()
                        .any(|row| row.thread_id == thread_id && row.invite.email == email);
                    if exists {
                        result.skipped += 1;
                        continue;
                    }

                    let invite = InviteRef {
                        id: Uuid::now_v7(),
                        email,
                        token: token::invite_token(),
                        user_id: recipient.user_id,
                    };
                    if let Some(user_id) = invite.user_id {
                        state.notifications.push(InAppNotification {
                            user_id,
                            workspace_id: action.workspace_id,
                            thread_id,
                            invite_id: invite.id,
                        });
                        result.deliveries.in_app_created += 1;
                    }
                    state.invites.push(InviteRow {
                        thread_id,
                        invite: invite.clone(),
                    });
                    invites.push(invite);
                    result.inserted += 1;
                }

                ExecutedBatch {
                    thread_id,
                    thread_title,
                    invites,
                    result,
                }
            }
            ExecutionWork::Slots { thread_id, slots } => {
                let thread_title = state
                    .threads
                    .get(&thread_id)
                    .map(|row| row.title.clone())
                    .ok_or(InvitationError::ThreadNotFound(thread_id))?;

                let mut result = ExecutionResult::default();
                for slot in slots {
                    let exists = state
                        .slots
                        .iter()
                        .any(|(id, existing)| *id == thread_id && *existing == slot);
                    if exists {
                        result.skipped += 1;
                    } else {
                        state.slots.push((thread_id, slot));
                        result.inserted += 1;
                    }
                }

                let invites = state
                    .invites
                    .iter()
                    .filter(|row| row.thread_id == thread_id)
                    .map(|row| row.invite.clone())
                    .collect();

                ExecutedBatch {
                    thread_id,
                    thread_title,
                    invites,
                    result,
                }
            }
        };

        if let Some(stored) = state.actions.get_mut(&action.id) {
            stored.status = PendingStatus::Executed;
            stored.executed_at = Some(now);
            stored.execute_request_id = execute_request_id;
            stored.thread_id = Some(batch.thread_id);
            stored.result = Some(ExecutionResult {
                deliveries: DeliveryCounts {
                    email_queued: 0,
                    ..batch.result.deliveries
                },
                ..batch.result
            });
        }

        Ok(Some(batch))
    }

    async fn save_result(&self, id: Uuid, result: &ExecutionResult) -> InvitationResult<()> {
        let mut state = self.state.write().await;
        let action = state.actions.get_mut(&id).ok_or(InvitationError::NotFound)?;
        action.result = Some(*result);
        Ok(())
    }
}
