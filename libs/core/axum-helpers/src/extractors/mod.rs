//! Custom extractors for Axum handlers.

pub mod request_id;
pub mod tenant;
pub mod uuid_path;
pub mod validated_json;

pub use request_id::{RequestId, REQUEST_ID_HEADER};
pub use tenant::{TenantContext, USER_ID_HEADER, WORKSPACE_ID_HEADER};
pub use uuid_path::UuidPath;
pub use validated_json::ValidatedJson;
