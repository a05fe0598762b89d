//! Invitations Domain
//!
//! Staged bulk invitations. An organizer's request is resolved into an
//! audience and parked behind a single-use confirm token; nothing is written
//! to threads or sent until the action is confirmed and executed.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← prepare / confirm / execute endpoints, audit trail
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐     ┌──────────────────┐
//! │   Service   │────►│ EmailJobProducer │  ← one job per new invite
//! └──────┬──────┘     └──────────────────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← pending actions, threads, invites (trait + implementations)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← PendingAction, summaries, DTOs
//! └─────────────┘
//! ```
//!
//! # Lifecycle
//!
//! `pending → decided → executed`, with lazy `pending | decided → expired`
//! once `expires_at` has passed. Every transition is a conditional update on
//! the expected prior status.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_invitations::{handlers, InMemoryInvitationRepository, InvitationConfig, InvitationService};
//!
//! let service = InvitationService::new(
//!     InMemoryInvitationRepository::new(),
//!     producer,
//!     InvitationConfig::default(),
//! );
//! let router = handlers::router(service);
//! ```

pub mod audience;
pub mod config;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod messages;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod service;
pub mod token;

pub use audience::{AudienceResolver, ResolvedEmails, ResolvedList};
pub use config::InvitationConfig;
pub use error::{InvitationError, InvitationResult};
pub use models::{
    ActionSummary, ActionType, ConfirmRequest, ConfirmResponse, Decision, DeliveryCounts, ExecuteRequest,
    ExecuteResponse, ExecutionResult, PendingAction, PendingStatus, PrepareInvitesRequest, PrepareResponse,
    PrepareSlotsRequest, PreviewEntry, Recipient, SkipCounts, SlotInput, SourceType,
};
pub use postgres::PgInvitationRepository;
pub use repository::{InMemoryInvitationRepository, InvitationRepository};
pub use service::InvitationService;
