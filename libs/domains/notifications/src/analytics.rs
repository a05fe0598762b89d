//! Fire-and-forget analytics events.

use chrono::Utc;
use redis::aio::ConnectionManager;
use serde_json::Value;
use tracing::{info, warn};

pub const ANALYTICS_STREAM: &str = "analytics:events";

/// Sink for product analytics. Emission never fails the caller.
#[cfg_attr(test, mockall::automock)]
pub trait AnalyticsSink: Send + Sync {
    fn emit(&self, event: &str, properties: Value);
}

/// Appends events to the `analytics:events` stream from a detached task.
#[derive(Clone)]
pub struct RedisAnalyticsSink {
    redis: ConnectionManager,
}

impl RedisAnalyticsSink {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

impl AnalyticsSink for RedisAnalyticsSink {
    fn emit(&self, event: &str, properties: Value) {
        let mut conn = self.redis.clone();
        let event = event.to_string();
        let properties = properties.to_string();
        let at = Utc::now().timestamp_millis();

        tokio::spawn(async move {
            let result: Result<String, redis::RedisError> = redis::cmd("XADD")
                .arg(ANALYTICS_STREAM)
                .arg("MAXLEN")
                .arg("~")
                .arg(100_000)
                .arg("*")
                .arg("event")
                .arg(&event)
                .arg("properties")
                .arg(&properties)
                .arg("at")
                .arg(at)
                .query_async(&mut conn)
                .await;

            if let Err(e) = result {
                warn!(event = %event, error = %e, "Failed to emit analytics event");
            }
        });
    }
}

/// Logs events instead of storing them.
#[derive(Clone, Copy, Default)]
pub struct TracingAnalyticsSink;

impl AnalyticsSink for TracingAnalyticsSink {
    fn emit(&self, event: &str, properties: Value) {
        info!(target: "analytics", event, %properties, "Analytics event");
    }
}
