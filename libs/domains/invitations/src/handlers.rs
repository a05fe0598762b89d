use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    routing::post,
};
use axum_helpers::{
    AppError, AuditEvent, AuditOutcome, RequestId, TenantContext, UuidPath, ValidatedJson,
    errors::responses::{
        BadRequestResponse, BadRequestUuidResponse, InternalServerErrorResponse, NotFoundResponse,
        UnauthorizedResponse,
    },
    extract_ip_from_headers,
};
use serde_json::json;
use std::sync::Arc;
use utoipa::OpenApi;
use validator::Validate;

use crate::error::InvitationError;
use crate::models::{
    ActionSummary, ActionType, ConfirmRequest, ConfirmResponse, DeliveryCounts, Decision, ExecuteRequest,
    ExecuteResponse, ExecutionResult, PendingStatus, PrepareInvitesRequest, PrepareResponse,
    PrepareSlotsRequest, PreviewEntry, SkipCounts, SlotInput,
};
use crate::repository::InvitationRepository;
use crate::service::InvitationService;

const TAG: &str = "invitations";

/// OpenAPI documentation for the invitations API
#[derive(OpenApi)]
#[openapi(
    paths(prepare_send, prepare_thread_invites, prepare_slots, confirm, execute),
    components(
        schemas(
            PrepareInvitesRequest,
            PrepareSlotsRequest,
            PrepareResponse,
            ConfirmRequest,
            ConfirmResponse,
            ExecuteRequest,
            ExecuteResponse,
            ActionSummary,
            ActionType,
            Decision,
            PendingStatus,
            PreviewEntry,
            SkipCounts,
            SlotInput,
            ExecutionResult,
            DeliveryCounts,
        ),
        responses(
            BadRequestResponse,
            BadRequestUuidResponse,
            NotFoundResponse,
            UnauthorizedResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = TAG, description = "Staged bulk invitations: prepare, confirm, execute")
    )
)]
pub struct ApiDoc;

/// Create the invitations router
pub fn router<R: InvitationRepository + 'static>(service: InvitationService<R>) -> Router {
    Router::new()
        .route("/threads/prepare-send", post(prepare_send::<R>))
        .route("/threads/{id}/invites/prepare", post(prepare_thread_invites::<R>))
        .route("/threads/{id}/slots/prepare", post(prepare_slots::<R>))
        .route("/pending-actions/{token}/confirm", post(confirm::<R>))
        .route("/pending-actions/{token}/execute", post(execute::<R>))
        .with_state(Arc::new(service))
}

/// Context shared by the audit trail of every endpoint.
struct Audit<'a> {
    tenant: &'a TenantContext,
    request_id: &'a RequestId,
    headers: &'a HeaderMap,
    action: &'static str,
}

impl Audit<'_> {
    fn event(&self, outcome: AuditOutcome) -> AuditEvent {
        AuditEvent::new(self.tenant, self.action, outcome)
            .with_request_id(self.request_id)
            .with_ip(extract_ip_from_headers(self.headers))
    }

    fn success(&self, resource: String, details: serde_json::Value) {
        self.event(AuditOutcome::Success)
            .with_resource(resource)
            .with_details(details)
            .log();
    }

    /// Log the rejection and convert it to the HTTP error.
    fn failure(&self, err: InvitationError) -> AppError {
        let (code, error) = err.code();
        self.event(AuditOutcome::Failure)
            .with_details(json!({ "code": code, "error": error }))
            .log();
        AppError::from(err).with_request_id(self.request_id.as_str())
    }
}

/// Stage invitations to a new thread
#[utoipa::path(
    post,
    path = "/threads/prepare-send",
    tag = TAG,
    request_body = PrepareInvitesRequest,
    params(
        ("x-workspace-id" = Uuid, Header, description = "Workspace of the caller"),
        ("x-user-id" = Uuid, Header, description = "Authenticated user")
    ),
    responses(
        (status = 200, description = "Pending action staged", body = PrepareResponse),
        (status = 400, response = BadRequestResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn prepare_send<R: InvitationRepository>(
    State(service): State<Arc<InvitationService<R>>>,
    tenant: TenantContext,
    request_id: RequestId,
    headers: HeaderMap,
    ValidatedJson(input): ValidatedJson<PrepareInvitesRequest>,
) -> Result<Json<PrepareResponse>, AppError> {
    let audit = Audit {
        tenant: &tenant,
        request_id: &request_id,
        headers: &headers,
        action: "pending_action.prepare",
    };

    let response = service
        .prepare_send(&tenant, input, Some(request_id.to_string()))
        .await
        .map_err(|e| audit.failure(e))?;

    audit.success(
        format!("pending_action:{}", response.pending_action_id),
        json!({
            "action_type": ActionType::SendInvites,
            "valid": response.summary.valid,
            "skipped": response.summary.skipped.total(),
        }),
    );
    Ok(Json(response))
}

/// Stage invitations to an existing thread
#[utoipa::path(
    post,
    path = "/threads/{id}/invites/prepare",
    tag = TAG,
    request_body = PrepareInvitesRequest,
    params(
        ("id" = Uuid, Path, description = "Thread ID"),
        ("x-workspace-id" = Uuid, Header, description = "Workspace of the caller"),
        ("x-user-id" = Uuid, Header, description = "Authenticated user")
    ),
    responses(
        (status = 200, description = "Pending action staged", body = PrepareResponse),
        (status = 400, response = BadRequestResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn prepare_thread_invites<R: InvitationRepository>(
    State(service): State<Arc<InvitationService<R>>>,
    tenant: TenantContext,
    request_id: RequestId,
    headers: HeaderMap,
    UuidPath(thread_id): UuidPath,
    ValidatedJson(input): ValidatedJson<PrepareInvitesRequest>,
) -> Result<Json<PrepareResponse>, AppError> {
    let audit = Audit {
        tenant: &tenant,
        request_id: &request_id,
        headers: &headers,
        action: "pending_action.prepare",
    };

    let response = service
        .prepare_thread_invites(&tenant, thread_id, input, Some(request_id.to_string()))
        .await
        .map_err(|e| audit.failure(e))?;

    audit.success(
        format!("pending_action:{}", response.pending_action_id),
        json!({
            "action_type": ActionType::AddInvites,
            "thread_id": thread_id,
            "valid": response.summary.valid,
            "already_invited": response.summary.skipped.already_invited,
        }),
    );
    Ok(Json(response))
}

/// Stage additional time slots for an existing thread
#[utoipa::path(
    post,
    path = "/threads/{id}/slots/prepare",
    tag = TAG,
    request_body = PrepareSlotsRequest,
    params(
        ("id" = Uuid, Path, description = "Thread ID"),
        ("x-workspace-id" = Uuid, Header, description = "Workspace of the caller"),
        ("x-user-id" = Uuid, Header, description = "Authenticated user")
    ),
    responses(
        (status = 200, description = "Pending action staged", body = PrepareResponse),
        (status = 400, response = BadRequestResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn prepare_slots<R: InvitationRepository>(
    State(service): State<Arc<InvitationService<R>>>,
    tenant: TenantContext,
    request_id: RequestId,
    headers: HeaderMap,
    UuidPath(thread_id): UuidPath,
    ValidatedJson(input): ValidatedJson<PrepareSlotsRequest>,
) -> Result<Json<PrepareResponse>, AppError> {
    let audit = Audit {
        tenant: &tenant,
        request_id: &request_id,
        headers: &headers,
        action: "pending_action.prepare",
    };

    let response = service
        .prepare_slots(&tenant, thread_id, input, Some(request_id.to_string()))
        .await
        .map_err(|e| audit.failure(e))?;

    audit.success(
        format!("pending_action:{}", response.pending_action_id),
        json!({
            "action_type": ActionType::AddSlots,
            "thread_id": thread_id,
            "slots": response.summary.valid,
        }),
    );
    Ok(Json(response))
}

/// Record a decision for a staged action
#[utoipa::path(
    post,
    path = "/pending-actions/{token}/confirm",
    tag = TAG,
    request_body = ConfirmRequest,
    params(
        ("token" = String, Path, description = "Confirm token returned by prepare"),
        ("x-workspace-id" = Uuid, Header, description = "Workspace of the caller"),
        ("x-user-id" = Uuid, Header, description = "Authenticated user")
    ),
    responses(
        (status = 200, description = "Decision recorded", body = ConfirmResponse),
        (status = 400, response = BadRequestResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn confirm<R: InvitationRepository>(
    State(service): State<Arc<InvitationService<R>>>,
    tenant: TenantContext,
    request_id: RequestId,
    headers: HeaderMap,
    Path(token): Path<String>,
    Json(input): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, AppError> {
    let audit = Audit {
        tenant: &tenant,
        request_id: &request_id,
        headers: &headers,
        action: "pending_action.confirm",
    };

    let response = service
        .confirm(&tenant, &token, &input.decision)
        .await
        .map_err(|e| audit.failure(e))?;

    audit.success(
        "pending_action".to_string(),
        json!({ "decision": response.decision, "can_execute": response.can_execute }),
    );
    Ok(Json(response))
}

/// Execute a confirmed action (idempotent)
#[utoipa::path(
    post,
    path = "/pending-actions/{token}/execute",
    tag = TAG,
    request_body(content = ExecuteRequest, description = "Optional; `request_id` is recorded as the execution key"),
    params(
        ("token" = String, Path, description = "Confirm token returned by prepare"),
        ("x-workspace-id" = Uuid, Header, description = "Workspace of the caller"),
        ("x-user-id" = Uuid, Header, description = "Authenticated user")
    ),
    responses(
        (status = 200, description = "Action executed, or the recorded result of an earlier execute", body = ExecuteResponse),
        (status = 400, response = BadRequestResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn execute<R: InvitationRepository>(
    State(service): State<Arc<InvitationService<R>>>,
    tenant: TenantContext,
    request_id: RequestId,
    headers: HeaderMap,
    Path(token): Path<String>,
    body: Bytes,
) -> Result<Json<ExecuteResponse>, AppError> {
    let audit = Audit {
        tenant: &tenant,
        request_id: &request_id,
        headers: &headers,
        action: "pending_action.execute",
    };

    // The body is optional; an empty one means "no request id".
    let input: ExecuteRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ExecuteRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))?
    };
    input.validate()?;

    let execute_request_id = input.request_id.unwrap_or_else(|| request_id.to_string());
    let response = service
        .execute(&tenant, &token, Some(execute_request_id))
        .await
        .map_err(|e| audit.failure(e))?;

    audit.success(
        format!("thread:{}", response.thread_id),
        json!({
            "inserted": response.result.inserted,
            "skipped": response.result.skipped,
            "failed": response.result.failed,
            "email_queued": response.result.deliveries.email_queued,
        }),
    );
    Ok(Json(response))
}
