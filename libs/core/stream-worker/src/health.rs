//! HTTP surface of a worker process: probes, stream depth, metrics and DLQ inspection.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::WorkerConfig;
use crate::consumer::StreamConsumer;
use crate::dlq::DlqManager;
use crate::metrics;

#[derive(Clone)]
pub struct HealthState {
    pub redis: ConnectionManager,
    pub app_name: String,
    pub app_version: String,
    pub config: WorkerConfig,
}

impl HealthState {
    pub fn new(
        redis: ConnectionManager,
        app_name: impl Into<String>,
        app_version: impl Into<String>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            redis,
            app_name: app_name.into(),
            app_version: app_version.into(),
            config,
        }
    }

    fn dlq(&self) -> DlqManager {
        DlqManager::new(self.redis.clone(), &self.config.dlq_stream)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub name: String,
    pub version: String,
}

async fn health_handler(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        name: state.app_name,
        version: state.app_version,
    })
}

async fn ready_handler(State(state): State<HealthState>) -> (StatusCode, Json<Value>) {
    let mut conn = state.redis.clone();
    let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;

    match result {
        Ok(pong) if pong == "PONG" => (
            StatusCode::OK,
            Json(json!({ "status": "ready", "checks": { "redis": "ok" } })),
        ),
        Ok(other) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready", "checks": { "redis": format!("unexpected response: {other}") } })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready", "checks": { "redis": format!("error: {e}") } })),
        ),
    }
}

async fn stream_info_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let consumer = StreamConsumer::new(state.redis.clone(), state.config.clone());
    match consumer.stream_info().await {
        Ok(info) => (StatusCode::OK, Json(json!(info))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Failed to get stream info: {e}") })),
        ),
    }
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::prometheus_handle() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "Metrics not initialized".to_string(),
        ),
    }
}

#[derive(Debug, Deserialize)]
struct DlqListParams {
    #[serde(default = "default_limit")]
    limit: usize,
    /// Entry ID to start from (inclusive)
    start: Option<String>,
}

fn default_limit() -> usize {
    10
}

fn internal(e: impl ToString) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}

async fn dlq_stats_handler(
    State(state): State<HealthState>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    state.dlq().stats().await.map(Json).map_err(internal)
}

async fn dlq_list_handler(
    State(state): State<HealthState>,
    Query(params): Query<DlqListParams>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    let limit = params.limit.clamp(1, 100);
    let messages = state
        .dlq()
        .list(limit, params.start.as_deref())
        .await
        .map_err(internal)?;

    Ok(Json(json!({
        "count": messages.len(),
        "limit": limit,
        "messages": messages,
    })))
}

/// Probe, monitoring and read-only DLQ routes:
/// - `GET /health`, `GET /ready`
/// - `GET /stream/info`, `GET /metrics`
/// - `GET /admin/dlq/stats`, `GET /admin/dlq/messages`
pub fn worker_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/stream/info", get(stream_info_handler))
        .route("/metrics", get(metrics_handler))
        .route("/admin/dlq/stats", get(dlq_stats_handler))
        .route("/admin/dlq/messages", get(dlq_list_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            name: "email-worker".to_string(),
            version: "0.1.0".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"name\":\"email-worker\""));
    }

    #[test]
    fn test_dlq_list_params_defaults() {
        let params: DlqListParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.limit, 10);
        assert!(params.start.is_none());
    }
}
