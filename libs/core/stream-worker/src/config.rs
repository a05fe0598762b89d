//! Worker configuration.

use crate::registry::StreamDef;
use core_config::{env_parse, ConfigError};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub stream_name: String,
    pub consumer_group: String,
    /// Unique per process; auto-generated
    pub consumer_id: String,
    pub dlq_stream: String,
    pub max_length: i64,
    pub batch_size: usize,
    /// XREADGROUP BLOCK timeout (None = non-blocking)
    pub block_ms: Option<u64>,
    /// Minimum idle time before a pending message is reclaimed
    pub claim_idle_ms: u64,
    /// How often the worker runs XAUTOCLAIM
    pub claim_interval_ms: u64,
}

impl WorkerConfig {
    pub fn from_stream_def<S: StreamDef>() -> Self {
        Self {
            stream_name: S::STREAM_NAME.to_string(),
            consumer_group: S::CONSUMER_GROUP.to_string(),
            consumer_id: format!("worker-{}", Uuid::now_v7()),
            dlq_stream: S::DLQ_STREAM.to_string(),
            max_length: S::MAX_LENGTH,
            batch_size: S::BATCH_SIZE,
            block_ms: Some(S::BLOCK_MS),
            claim_idle_ms: S::CLAIM_IDLE_MS,
            claim_interval_ms: S::CLAIM_IDLE_MS / 2,
        }
    }

    pub fn new(stream_name: impl Into<String>, consumer_group: impl Into<String>) -> Self {
        let stream_name = stream_name.into();
        Self {
            dlq_stream: format!("{stream_name}:dlq"),
            stream_name,
            consumer_group: consumer_group.into(),
            consumer_id: format!("worker-{}", Uuid::now_v7()),
            max_length: 100_000,
            batch_size: 10,
            block_ms: Some(5_000),
            claim_idle_ms: 30_000,
            claim_interval_ms: 15_000,
        }
    }

    /// Apply `WORKER_BATCH_SIZE`, `WORKER_CLAIM_IDLE_MS`, `WORKER_BLOCK_MS` and
    /// `WORKER_CONSUMER_ID` when set.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        self.batch_size = env_parse("WORKER_BATCH_SIZE", self.batch_size)?.max(1);
        self.claim_idle_ms = env_parse("WORKER_CLAIM_IDLE_MS", self.claim_idle_ms)?;
        self.claim_interval_ms = (self.claim_idle_ms / 2).max(1_000);
        if core_config::env_optional("WORKER_BLOCK_MS").is_some() {
            self.block_ms = Some(env_parse("WORKER_BLOCK_MS", 0)?);
        }
        if let Some(id) = core_config::env_optional("WORKER_CONSUMER_ID") {
            self.consumer_id = id;
        }
        Ok(self)
    }

    pub fn with_consumer_id(mut self, id: impl Into<String>) -> Self {
        self.consumer_id = id.into();
        self
    }

    pub fn with_dlq_stream(mut self, stream: impl Into<String>) -> Self {
        self.dlq_stream = stream.into();
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn with_blocking(mut self, timeout_ms: Option<u64>) -> Self {
        self.block_ms = timeout_ms;
        self
    }

    pub fn with_claim_idle_ms(mut self, idle_ms: u64) -> Self {
        self.claim_idle_ms = idle_ms;
        self
    }

    pub fn with_claim_interval_ms(mut self, interval_ms: u64) -> Self {
        self.claim_interval_ms = interval_ms;
        self
    }
}
