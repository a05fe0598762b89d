use chrono::{DateTime, Utc};
use sea_orm::{DeriveActiveEnum, EnumIter, prelude::StringLen};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Number of addresses shown in a summary preview.
pub const PREVIEW_LIMIT: usize = 5;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionType {
    /// Invite recipients to a thread created on execute.
    #[sea_orm(string_value = "send_invites")]
    SendInvites,
    /// Invite recipients to an existing thread.
    #[sea_orm(string_value = "add_invites")]
    AddInvites,
    /// Propose more time slots on an existing thread.
    #[sea_orm(string_value = "add_slots")]
    AddSlots,
}

impl ActionType {
    /// Decision vocabulary accepted for this action.
    pub fn allowed_decisions(&self) -> &'static [Decision] {
        match self {
            ActionType::SendInvites | ActionType::AddInvites => {
                &[Decision::Send, Decision::Cancel, Decision::NewThread]
            }
            ActionType::AddSlots => &[Decision::Add, Decision::Cancel],
        }
    }

    pub fn accepts(&self, decision: Decision) -> bool {
        self.allowed_decisions().contains(&decision)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceType {
    #[sea_orm(string_value = "emails")]
    Emails,
    #[sea_orm(string_value = "list")]
    List,
    /// Slot proposals carry no audience.
    #[sea_orm(string_value = "slots")]
    Slots,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Decision {
    #[sea_orm(string_value = "send")]
    Send,
    #[sea_orm(string_value = "cancel")]
    Cancel,
    /// Execute into a fresh thread even when the action targets an existing one.
    #[sea_orm(string_value = "new_thread")]
    NewThread,
    #[sea_orm(string_value = "add")]
    Add,
}

impl Decision {
    pub fn can_execute(&self) -> bool {
        !matches!(self, Decision::Cancel)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PendingStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "decided")]
    Decided,
    #[sea_orm(string_value = "executed")]
    Executed,
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl PendingStatus {
    /// `pending → decided | expired`, `decided → executed | expired`. Nothing else.
    pub fn can_transition_to(&self, next: PendingStatus) -> bool {
        matches!(
            (self, next),
            (PendingStatus::Pending, PendingStatus::Decided)
                | (PendingStatus::Pending, PendingStatus::Expired)
                | (PendingStatus::Decided, PendingStatus::Executed)
                | (PendingStatus::Decided, PendingStatus::Expired)
        )
    }
}

/// One resolved recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Recipient {
    /// Normalized (trimmed, lowercase) address.
    pub email: String,
    /// Set when the address belongs to a platform user.
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Validate)]
#[validate(schema(function = "validate_slot_range"))]
pub struct SlotInput {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

fn validate_slot_range(slot: &SlotInput) -> Result<(), ValidationError> {
    if slot.end <= slot.start {
        return Err(ValidationError::new("end_before_start"));
    }
    Ok(())
}

/// Everything execute needs, frozen at prepare time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayload {
    pub title: String,
    pub inviter_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub slots: Vec<SlotInput>,
}

/// Addresses left out of the audience, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SkipCounts {
    pub invalid_email: usize,
    pub duplicate_input: usize,
    pub missing_email: usize,
    pub already_invited: usize,
}

impl SkipCounts {
    pub fn total(&self) -> usize {
        self.invalid_email + self.duplicate_input + self.missing_email + self.already_invited
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PreviewEntry {
    pub email: String,
    pub is_existing_user: bool,
}

/// What the organizer is asked to confirm. Computed once at prepare and never
/// recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ActionSummary {
    pub action_type: ActionType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_name: Option<String>,
    /// Entries in the request (or members in the list).
    pub total: usize,
    pub valid: usize,
    /// First few recipients.
    pub preview: Vec<PreviewEntry>,
    pub skipped: SkipCounts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slots: Vec<SlotInput>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeliveryCounts {
    pub email_queued: usize,
    pub in_app_created: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExecutionResult {
    pub inserted: usize,
    /// Rows rejected by a unique constraint at insert time.
    pub skipped: usize,
    /// Rows whose insert failed for any other reason.
    pub failed: usize,
    pub deliveries: DeliveryCounts,
}

/// A staged bulk operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub owner_user_id: Uuid,
    pub thread_id: Option<Uuid>,
    pub action_type: ActionType,
    pub source_type: SourceType,
    pub payload: PendingPayload,
    pub summary: ActionSummary,
    pub confirm_token: String,
    pub decision: Option<Decision>,
    pub status: PendingStatus,
    pub result: Option<ExecutionResult>,
    pub request_id: Option<String>,
    pub execute_request_id: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PendingAction {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Input for a new pending action row.
#[derive(Debug, Clone)]
pub struct NewPendingAction {
    pub workspace_id: Uuid,
    pub owner_user_id: Uuid,
    pub thread_id: Option<Uuid>,
    pub action_type: ActionType,
    pub source_type: SourceType,
    pub payload: PendingPayload,
    pub summary: ActionSummary,
    pub confirm_token: String,
    pub request_id: Option<String>,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Directory / thread views used by prepare and execute
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMember {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactList {
    pub id: Uuid,
    pub name: String,
    pub members: Vec<ContactMember>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRef {
    pub id: Uuid,
    pub title: String,
}

/// Invite row a job is sent for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteRef {
    pub id: Uuid,
    pub email: String,
    pub token: String,
    pub user_id: Option<Uuid>,
}

/// Writes performed by execute inside its transaction.
#[derive(Debug, Clone)]
pub enum ExecutionWork {
    Invites {
        /// `None` creates a thread titled `title`.
        thread_id: Option<Uuid>,
        title: String,
        recipients: Vec<Recipient>,
    },
    Slots {
        thread_id: Uuid,
        slots: Vec<SlotInput>,
    },
}

/// Outcome of the execute transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedBatch {
    pub thread_id: Uuid,
    pub thread_title: String,
    /// Invites to email: the new rows, or every invite of the thread for slot proposals.
    pub invites: Vec<InviteRef>,
    pub result: ExecutionResult,
}

// ============================================================================
// HTTP DTOs
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct PrepareInvitesRequest {
    /// `emails` or `list`.
    #[schema(example = "emails")]
    pub source_type: String,
    pub emails: Option<Vec<String>>,
    pub list_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    /// Personal note included in the invite email.
    #[validate(length(max = 2000))]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct PrepareSlotsRequest {
    #[validate(length(min = 1, max = 20))]
    #[validate(nested)]
    pub slots: Vec<SlotInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PrepareResponse {
    pub pending_action_id: Uuid,
    pub confirm_token: String,
    pub expires_at: DateTime<Utc>,
    pub summary: ActionSummary,
    pub message_for_chat: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ConfirmRequest {
    #[schema(example = "send")]
    pub decision: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ConfirmResponse {
    pub decision: Decision,
    pub can_execute: bool,
    pub message_for_chat: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct ExecuteRequest {
    #[validate(length(max = 128))]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExecuteResponse {
    pub thread_id: Uuid,
    pub result: ExecutionResult,
    pub message_for_chat: String,
}
