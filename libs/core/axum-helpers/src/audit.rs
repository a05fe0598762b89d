//! Audit trail for tenant-visible state changes.
//!
//! Events are emitted as one JSON line on the `audit` tracing target so the
//! log pipeline can route them separately.
//!
//! ```ignore
//! AuditEvent::new(&tenant, "pending_action.confirm", AuditOutcome::Success)
//!     .with_resource(format!("pending_action:{}", action.id))
//!     .with_request_id(&request_id)
//!     .with_details(json!({ "decision": "send" }))
//!     .log();
//! ```

use crate::extractors::{RequestId, TenantContext};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

#[derive(Debug, Serialize)]
pub struct AuditEvent {
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    /// e.g. "pending_action.prepare", "pending_action.execute"
    pub action: String,
    /// e.g. "pending_action:0192..."
    pub resource: Option<String>,
    pub outcome: AuditOutcome,
    pub request_id: Option<String>,
    pub ip_address: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub details: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn new(tenant: &TenantContext, action: impl Into<String>, outcome: AuditOutcome) -> Self {
        Self {
            workspace_id: tenant.workspace_id,
            user_id: tenant.user_id,
            action: action.into(),
            resource: None,
            outcome,
            request_id: None,
            ip_address: None,
            timestamp: Utc::now(),
            details: None,
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_request_id(mut self, request_id: &RequestId) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }

    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }

    pub fn with_details(mut self, details: impl Serialize) -> Self {
        self.details = serde_json::to_value(details).ok();
        self
    }

    pub fn log(self) {
        let line = serde_json::to_string(&self)
            .unwrap_or_else(|_| "Failed to serialize audit event".to_string());
        tracing::info!(
            target: "audit",
            workspace_id = %self.workspace_id,
            user_id = %self.user_id,
            action = %self.action,
            resource = self.resource,
            outcome = ?self.outcome,
            request_id = self.request_id,
            "{}",
            line
        );
    }
}

/// First hop of `X-Forwarded-For`, falling back to `X-Real-IP`.
pub fn extract_ip_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_serializes_tenant_and_outcome() {
        let tenant = TenantContext::new(Uuid::now_v7(), Uuid::now_v7());
        let event = AuditEvent::new(&tenant, "pending_action.execute", AuditOutcome::Success)
            .with_resource("pending_action:abc")
            .with_request_id(&RequestId("req-9".into()))
            .with_details(serde_json::json!({ "inserted": 3 }));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["outcome"], "success");
        assert_eq!(json["request_id"], "req-9");
        assert_eq!(json["details"]["inserted"], 3);
        assert_eq!(json["workspace_id"], tenant.workspace_id.to_string());
    }

    #[test]
    fn test_forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.1, 172.16.0.1".parse().unwrap());
        assert_eq!(extract_ip_from_headers(&headers).as_deref(), Some("10.0.0.1"));
    }
}
