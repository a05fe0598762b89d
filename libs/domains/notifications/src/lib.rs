//! Notifications Domain
//!
//! Email jobs for Rally: the typed job model, the producer that publishes
//! them, and everything the email worker needs to deliver them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ ExecutionEngine  │  ← one job per inserted invite
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │ EmailJobProducer │  ← builds subject + payload, emits analytics event
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │   Redis Stream   │  ← email:jobs, consumer group email_workers
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │  Email Worker    │  ← EmailDeliveryProcessor: ledger check, render,
//! └────────┬─────────┘    send with 429 retry, spacing
//!          │
//! ┌────────▼─────────┐
//! │  Email Provider  │  ← HTTP API, or mock mode without an API key
//! └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_notifications::{EmailJobProducer, RedisJobQueue, RedisAnalyticsSink};
//!
//! let producer = EmailJobProducer::new(
//!     Arc::new(RedisJobQueue::new(redis.clone())),
//!     Arc::new(RedisAnalyticsSink::new(redis)),
//! );
//! producer.enqueue_invite(&email, invite_data).await?;
//! ```

pub mod analytics;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod processor;
pub mod producer;
pub mod provider;
pub mod queue;
pub mod streams;
pub mod templates;

pub use analytics::{AnalyticsSink, RedisAnalyticsSink, TracingAnalyticsSink};
pub use config::{DeliveryPolicy, EmailProviderConfig};
pub use error::{NotificationError, NotificationResult};
pub use ledger::{DeliveryLedger, DeliveryStatus, InMemoryDeliveryLedger, PgDeliveryLedger};
pub use models::{
    AdditionalSlotsData, BroadcastData, DeliveryRef, EmailJob, EmailKind, EmailPayload,
    FinalizedData, InviteData, OneOnOneData, OtpData, ReminderData, SlotSummary,
    ThreadMessageData,
};
pub use processor::{DeliveryOutcome, EmailDeliveryProcessor};
pub use producer::{EmailJobProducer, QueuedEmail};
pub use provider::{EmailContent, EmailProvider, HttpEmailProvider, MockEmailProvider, SentEmail};
pub use queue::{InMemoryJobQueue, JobQueue, RedisJobQueue};
pub use streams::EmailStream;
pub use templates::{RenderedEmail, TemplateEngine};
