pub mod codes;
pub mod handlers;
pub mod responses;

pub use codes::ErrorCode;

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

/// Body of every error response.
///
/// ```json
/// {
///   "code": 6003,
///   "error": "list_too_large",
///   "message": "That list has 1001 members; the limit is 1000.",
///   "details": { "total": 1001, "limit": 1000 }
/// }
/// ```
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Integer code for logs and monitoring
    pub code: i32,
    /// Machine-readable identifier
    pub error: String,
    /// Human-readable message
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Correlation id, present on server-side failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// An error raised by domain code with its own machine code and status.
#[derive(Debug)]
pub struct DomainError {
    pub status: StatusCode,
    pub code: i32,
    pub error: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    #[error("JSON parsing error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("JSON extraction error: {0}")]
    JsonExtractorRejection(#[from] JsonRejection),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationErrors),

    #[error("UUID error: {0}")]
    UuidError(#[from] uuid::Error),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal Server Error: {0}")]
    InternalServerError(String),

    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Domain(DomainError),

    #[error("{source}")]
    WithRequestId {
        source: Box<AppError>,
        request_id: String,
    },
}

impl AppError {
    /// Attach the caller's request id so it is echoed on server-side failures.
    pub fn with_request_id(self, request_id: impl Into<String>) -> Self {
        match self {
            AppError::WithRequestId { source, .. } => AppError::WithRequestId {
                source,
                request_id: request_id.into(),
            },
            other => AppError::WithRequestId {
                source: Box::new(other),
                request_id: request_id.into(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::SerdeJson(_) | AppError::Database(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::JsonExtractorRejection(e) => e.status(),
            AppError::ValidationError(_) | AppError::UuidError(_) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Domain(e) => e.status,
            AppError::WithRequestId { source, .. } => source.status(),
        }
    }

    fn into_parts(self, request_id: Option<String>) -> (StatusCode, ErrorResponse) {
        let status = self.status();
        let envelope = |code: ErrorCode, message: String, details: Option<serde_json::Value>| {
            ErrorResponse {
                code: code.code(),
                error: code.as_str().to_string(),
                message,
                details,
                request_id: None,
            }
        };

        let mut body = match self {
            AppError::SerdeJson(e) => {
                tracing::error!(error_code = ErrorCode::SerdeJsonError.code(), request_id = ?request_id, "JSON error: {:?}", e);
                envelope(ErrorCode::SerdeJsonError, ErrorCode::SerdeJsonError.default_message().to_string(), None)
            }
            AppError::Database(e) => {
                tracing::error!(error_code = ErrorCode::DatabaseError.code(), request_id = ?request_id, "Database error: {:?}", e);
                envelope(ErrorCode::DatabaseError, ErrorCode::DatabaseError.default_message().to_string(), None)
            }
            AppError::JsonExtractorRejection(e) => {
                tracing::warn!(error_code = ErrorCode::JsonExtraction.code(), "JSON extraction error: {:?}", e);
                envelope(ErrorCode::JsonExtraction, e.body_text(), None)
            }
            AppError::ValidationError(e) => {
                tracing::info!(error_code = ErrorCode::ValidationError.code(), "Validation error: {:?}", e);
                envelope(
                    ErrorCode::ValidationError,
                    ErrorCode::ValidationError.default_message().to_string(),
                    Some(validation_details(&e)),
                )
            }
            AppError::UuidError(e) => {
                tracing::warn!(error_code = ErrorCode::InvalidUuid.code(), "UUID error: {:?}", e);
                envelope(ErrorCode::InvalidUuid, ErrorCode::InvalidUuid.default_message().to_string(), None)
            }
            AppError::BadRequest(msg) => envelope(ErrorCode::ValidationError, msg, None),
            AppError::Unauthorized(msg) => {
                tracing::info!("Unauthorized: {}", msg);
                envelope(ErrorCode::Unauthorized, msg, None)
            }
            AppError::NotFound(msg) => envelope(ErrorCode::NotFound, msg, None),
            AppError::Conflict(msg) => envelope(ErrorCode::Conflict, msg, None),
            AppError::InternalServerError(msg) => {
                tracing::error!(error_code = ErrorCode::InternalError.code(), request_id = ?request_id, "Internal server error: {}", msg);
                envelope(ErrorCode::InternalError, ErrorCode::InternalError.default_message().to_string(), None)
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                envelope(ErrorCode::ServiceUnavailable, ErrorCode::ServiceUnavailable.default_message().to_string(), None)
            }
            AppError::Domain(e) => {
                tracing::info!(error_code = e.code, error = e.error, "Domain error: {}", e.message);
                ErrorResponse {
                    code: e.code,
                    error: e.error.to_string(),
                    message: e.message,
                    details: e.details,
                    request_id: None,
                }
            }
            AppError::WithRequestId { source, request_id } => {
                return source.into_parts(Some(request_id));
            }
        };

        if status.is_server_error() {
            body.request_id = request_id;
        }
        (status, body)
    }
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        AppError::Domain(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_parts(None);
        (status, Json(body)).into_response()
    }
}

/// Field errors keyed by field name, as returned in `details`.
pub fn validation_details(errors: &ValidationErrors) -> serde_json::Value {
    let details = errors
        .field_errors()
        .iter()
        .map(|(field, errors)| {
            let messages: Vec<serde_json::Value> = errors
                .iter()
                .map(|err| {
                    serde_json::json!({
                        "code": err.code,
                        "message": err.message,
                        "params": err.params,
                    })
                })
                .collect();
            (field.to_string(), serde_json::json!(messages))
        })
        .collect::<serde_json::Map<_, _>>();
    serde_json::Value::Object(details)
}

pub fn error_response(status: StatusCode, message: String, error_code: ErrorCode) -> Response {
    let body = Json(ErrorResponse {
        code: error_code.code(),
        error: error_code.as_str().to_string(),
        message,
        details: None,
        request_id: None,
    });

    (status, body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(response: Response) -> ErrorResponse {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_internal_error_hides_message_and_echoes_request_id() {
        let response = AppError::InternalServerError("pool exhausted at db-3".into())
            .with_request_id("req-42")
            .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(response).await;
        assert_eq!(body.error, "internal_error");
        assert!(!body.message.contains("db-3"));
        assert_eq!(body.request_id.as_deref(), Some("req-42"));
    }

    #[tokio::test]
    async fn test_domain_error_keeps_code_and_details() {
        let response = AppError::from(DomainError {
            status: StatusCode::BAD_REQUEST,
            code: 6003,
            error: "list_too_large",
            message: "too many".into(),
            details: Some(serde_json::json!({ "total": 1001, "limit": 1000 })),
        })
        .with_request_id("req-1")
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_of(response).await;
        assert_eq!(body.code, 6003);
        assert_eq!(body.error, "list_too_large");
        assert_eq!(body.details.unwrap()["limit"], 1000);
        assert!(body.request_id.is_none());
    }

    #[tokio::test]
    async fn test_not_found() {
        let response = AppError::NotFound("thread".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(response).await.code, 1004);
    }
}
