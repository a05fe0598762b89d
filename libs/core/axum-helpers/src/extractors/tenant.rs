use crate::errors::AppError;
use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

pub const WORKSPACE_ID_HEADER: &str = "x-workspace-id";
pub const USER_ID_HEADER: &str = "x-user-id";

/// Workspace and acting user, as established by the upstream auth layer.
///
/// Every store query is scoped by both ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub workspace_id: Uuid,
    pub user_id: Uuid,
}

impl TenantContext {
    pub fn new(workspace_id: Uuid, user_id: Uuid) -> Self {
        Self {
            workspace_id,
            user_id,
        }
    }
}

fn header_uuid(parts: &Parts, name: &str) -> Result<Uuid, AppError> {
    let raw = parts
        .headers
        .get(name)
        .ok_or_else(|| AppError::Unauthorized(format!("Missing {name} header")))?;

    raw.to_str()
        .ok()
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or_else(|| AppError::Unauthorized(format!("Malformed {name} header")))
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let workspace_id = header_uuid(parts, WORKSPACE_ID_HEADER).map_err(IntoResponse::into_response)?;
        let user_id = header_uuid(parts, USER_ID_HEADER).map_err(IntoResponse::into_response)?;
        Ok(TenantContext::new(workspace_id, user_id))
    }
}
