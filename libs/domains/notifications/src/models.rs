//! Email job types carried on the `email:jobs` stream.
//!
//! Wire shape of one entry:
//!
//! ```json
//! {
//!   "job_id": "0192...",
//!   "type": "invite",
//!   "to": "guest@example.com",
//!   "subject": "Ana invited you to Team sync",
//!   "created_at": 1760000000000,
//!   "data": { "invite_id": "...", "thread_id": "...", ... }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stream_worker::StreamJob;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

/// Discriminant of [`EmailPayload`], used for logging, metrics and template lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum EmailKind {
    Otp,
    Invite,
    Broadcast,
    ThreadMessage,
    Reminder,
    Finalized,
    AdditionalSlots,
    OneOnOne,
}

/// One proposed meeting time, as listed in slot emails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSummary {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpData {
    pub code: String,
    pub expires_in_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteData {
    pub invite_id: Uuid,
    pub thread_id: Uuid,
    pub thread_title: String,
    pub inviter_name: String,
    pub invite_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastData {
    pub delivery_id: Uuid,
    pub thread_id: Uuid,
    pub thread_title: String,
    pub sender_name: String,
    pub message: String,
    pub thread_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessageData {
    pub delivery_id: Uuid,
    pub thread_id: Uuid,
    pub message_id: Uuid,
    pub thread_title: String,
    pub sender_name: String,
    pub message: String,
    pub thread_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderData {
    pub invite_id: Uuid,
    pub thread_id: Uuid,
    pub thread_title: String,
    pub inviter_name: String,
    pub invite_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedData {
    pub thread_id: Uuid,
    pub thread_title: String,
    pub organizer_name: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub thread_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalSlotsData {
    pub invite_id: Uuid,
    pub thread_id: Uuid,
    pub thread_title: String,
    pub organizer_name: String,
    pub slots: Vec<SlotSummary>,
    pub invite_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneOnOneData {
    pub thread_id: Uuid,
    pub thread_title: String,
    pub organizer_name: String,
    pub booking_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Type-specific `data` object of a job, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EmailPayload {
    Otp(OtpData),
    Invite(InviteData),
    Broadcast(BroadcastData),
    ThreadMessage(ThreadMessageData),
    Reminder(ReminderData),
    Finalized(FinalizedData),
    AdditionalSlots(AdditionalSlotsData),
    OneOnOne(OneOnOneData),
}

/// Row in one of the delivery tables that records the outcome of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryRef {
    Invite(Uuid),
    Broadcast(Uuid),
    ThreadMessage(Uuid),
}

impl DeliveryRef {
    pub fn id(&self) -> Uuid {
        match self {
            DeliveryRef::Invite(id) | DeliveryRef::Broadcast(id) | DeliveryRef::ThreadMessage(id) => *id,
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            DeliveryRef::Invite(_) => "thread_invites",
            DeliveryRef::Broadcast(_) => "broadcast_deliveries",
            DeliveryRef::ThreadMessage(_) => "thread_message_deliveries",
        }
    }
}

impl EmailPayload {
    pub fn kind(&self) -> EmailKind {
        match self {
            EmailPayload::Otp(_) => EmailKind::Otp,
            EmailPayload::Invite(_) => EmailKind::Invite,
            EmailPayload::Broadcast(_) => EmailKind::Broadcast,
            EmailPayload::ThreadMessage(_) => EmailKind::ThreadMessage,
            EmailPayload::Reminder(_) => EmailKind::Reminder,
            EmailPayload::Finalized(_) => EmailKind::Finalized,
            EmailPayload::AdditionalSlots(_) => EmailKind::AdditionalSlots,
            EmailPayload::OneOnOne(_) => EmailKind::OneOnOne,
        }
    }

    /// Delivery row updated after a send, if this kind has one.
    pub fn delivery_ref(&self) -> Option<DeliveryRef> {
        match self {
            EmailPayload::Invite(data) => Some(DeliveryRef::Invite(data.invite_id)),
            EmailPayload::Broadcast(data) => Some(DeliveryRef::Broadcast(data.delivery_id)),
            EmailPayload::ThreadMessage(data) => Some(DeliveryRef::ThreadMessage(data.delivery_id)),
            EmailPayload::Otp(_)
            | EmailPayload::Reminder(_)
            | EmailPayload::Finalized(_)
            | EmailPayload::AdditionalSlots(_)
            | EmailPayload::OneOnOne(_) => None,
        }
    }

    /// Kinds whose delivery row is consulted before sending.
    ///
    /// Invites are marked sent afterwards but never skipped, so a redelivered
    /// invite job can be sent twice.
    pub fn is_idempotency_tracked(&self) -> bool {
        matches!(self.kind(), EmailKind::Broadcast | EmailKind::ThreadMessage)
    }
}

/// A queued email. Immutable once published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailJob {
    pub job_id: Uuid,
    pub to: String,
    pub subject: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EmailPayload,
}

impl EmailJob {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, payload: EmailPayload) -> Self {
        Self {
            job_id: Uuid::now_v7(),
            to: to.into(),
            subject: subject.into(),
            created_at: Utc::now(),
            payload,
        }
    }

    pub fn kind(&self) -> EmailKind {
        self.payload.kind()
    }
}

impl StreamJob for EmailJob {
    fn job_id(&self) -> String {
        self.job_id.to_string()
    }
}
