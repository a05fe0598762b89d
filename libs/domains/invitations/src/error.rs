use crate::messages;
use crate::models::{Decision, PendingStatus, SkipCounts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_helpers::{AppError, DomainError};
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum InvitationError {
    #[error("Invalid source type: {0}")]
    InvalidSourceType(String),

    #[error("No valid emails in audience of {total}")]
    NoValidEmails { total: usize, skipped: SkipCounts },

    #[error("Audience of {total} exceeds limit {limit}")]
    ListTooLarge { total: usize, limit: usize },

    #[error("Contact list not found: {0}")]
    ListNotFound(Uuid),

    #[error("Thread not found: {0}")]
    ThreadNotFound(Uuid),

    #[error("Pending action not found")]
    NotFound,

    #[error("Pending action already {status}")]
    AlreadyProcessed { status: PendingStatus },

    #[error("Pending action expired")]
    Expired,

    #[error("Pending action was cancelled")]
    Cancelled,

    #[error("Pending action has not been confirmed")]
    NotConfirmed,

    #[error("Decision '{decision}' not allowed")]
    InvalidDecision {
        decision: String,
        allowed: &'static [Decision],
    },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type InvitationResult<T> = Result<T, InvitationError>;

impl InvitationError {
    /// Machine code and numeric code reported to clients.
    pub fn code(&self) -> (i32, &'static str) {
        match self {
            InvitationError::InvalidSourceType(_) => (6001, "invalid_source_type"),
            InvitationError::NoValidEmails { .. } => (6002, "no_valid_emails"),
            InvitationError::ListTooLarge { .. } => (6003, "list_too_large"),
            InvitationError::ListNotFound(_) => (6004, "list_not_found"),
            InvitationError::ThreadNotFound(_) => (6005, "thread_not_found"),
            InvitationError::NotFound => (6010, "not_found"),
            InvitationError::AlreadyProcessed { .. } => (6011, "already_processed"),
            InvitationError::Expired => (6012, "expired"),
            InvitationError::Cancelled => (6013, "cancelled"),
            InvitationError::NotConfirmed => (6014, "not_confirmed"),
            InvitationError::InvalidDecision { .. } => (6015, "invalid_decision"),
            InvitationError::Validation(_) => (1001, "validation_error"),
            InvitationError::Database(_) => (2003, "database_error"),
            InvitationError::Internal(_) => (1005, "internal_error"),
        }
    }
}

fn domain(status: StatusCode, err: &InvitationError, message: String, details: Option<serde_json::Value>) -> AppError {
    let (code, error) = err.code();
    AppError::Domain(DomainError {
        status,
        code,
        error,
        message,
        details,
    })
}

impl From<InvitationError> for AppError {
    fn from(err: InvitationError) -> Self {
        match &err {
            InvitationError::InvalidSourceType(value) => domain(
                StatusCode::BAD_REQUEST,
                &err,
                messages::invalid_source_type(value),
                Some(json!({ "allowed": ["emails", "list"] })),
            ),
            InvitationError::NoValidEmails { total, skipped } => domain(
                StatusCode::BAD_REQUEST,
                &err,
                messages::no_valid_emails(*total, skipped),
                Some(json!({
                    "total": total,
                    "invalid_email": skipped.invalid_email,
                    "duplicate_input": skipped.duplicate_input,
                    "missing_email": skipped.missing_email,
                    "already_invited": skipped.already_invited,
                })),
            ),
            InvitationError::ListTooLarge { total, limit } => domain(
                StatusCode::BAD_REQUEST,
                &err,
                messages::list_too_large(*total, *limit),
                Some(json!({ "total": total, "limit": limit })),
            ),
            InvitationError::ListNotFound(_) => {
                domain(StatusCode::NOT_FOUND, &err, messages::list_not_found(), None)
            }
            InvitationError::ThreadNotFound(_) => {
                domain(StatusCode::NOT_FOUND, &err, messages::thread_not_found(), None)
            }
            InvitationError::NotFound => {
                domain(StatusCode::NOT_FOUND, &err, messages::pending_action_not_found(), None)
            }
            InvitationError::AlreadyProcessed { status } => domain(
                StatusCode::BAD_REQUEST,
                &err,
                messages::already_processed(*status),
                Some(json!({ "status": status })),
            ),
            InvitationError::Expired => domain(StatusCode::BAD_REQUEST, &err, messages::expired(), None),
            InvitationError::Cancelled => {
                domain(StatusCode::BAD_REQUEST, &err, messages::cancelled(), None)
            }
            InvitationError::NotConfirmed => {
                domain(StatusCode::BAD_REQUEST, &err, messages::not_confirmed(), None)
            }
            InvitationError::InvalidDecision { decision, allowed } => domain(
                StatusCode::BAD_REQUEST,
                &err,
                messages::invalid_decision(decision, allowed),
                Some(json!({ "allowed": allowed })),
            ),
            InvitationError::Validation(msg) => AppError::BadRequest(msg.clone()),
            InvitationError::Internal(msg) => AppError::InternalServerError(msg.clone()),
            InvitationError::Database(e) => AppError::InternalServerError(format!("Database error: {}", e)),
        }
    }
}

impl IntoResponse for InvitationError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
