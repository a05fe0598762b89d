//! Reusable OpenAPI response types.

use super::ErrorResponse;
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToResponse;

#[derive(ToResponse)]
#[response(
    description = "Internal Server Error",
    content_type = "application/json",
    example = json!({
        "code": 1005,
        "error": "internal_error",
        "message": "An internal server error occurred",
        "request_id": "01929f3e-7c4b-7d2a-9a10-6c1f2b7a9e01"
    })
)]
pub struct InternalServerErrorResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Bad Request",
    content_type = "application/json",
    example = json!({
        "code": 6002,
        "error": "no_valid_emails",
        "message": "None of the addresses can be invited.",
        "details": { "invalid_email": 1, "duplicate_input": 0, "missing_email": 0, "already_invited": 2 }
    })
)]
pub struct BadRequestResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Bad Request - Invalid UUID",
    content_type = "application/json",
    example = json!({
        "code": 1002,
        "error": "invalid_uuid",
        "message": "Invalid UUID format"
    })
)]
pub struct BadRequestUuidResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Resource not found",
    content_type = "application/json",
    example = json!({
        "code": 6010,
        "error": "not_found",
        "message": "No pending action matches this token."
    })
)]
pub struct NotFoundResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Unauthorized - tenant context missing",
    content_type = "application/json",
    example = json!({
        "code": 1006,
        "error": "unauthorized",
        "message": "Missing x-workspace-id header"
    })
)]
pub struct UnauthorizedResponse(pub ErrorResponse);
