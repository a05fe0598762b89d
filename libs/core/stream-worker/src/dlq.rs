//! Dead-letter stream for jobs that can never succeed.

use crate::error::StreamError;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::streams::StreamRangeReply;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::warn;

const DATA_FIELD: &str = "data";

#[derive(Clone)]
pub struct DlqManager {
    redis: ConnectionManager,
    dlq_stream: String,
    max_length: i64,
}

impl DlqManager {
    pub fn new(redis: ConnectionManager, dlq_stream: impl Into<String>) -> Self {
        Self {
            redis,
            dlq_stream: dlq_stream.into(),
            max_length: 10_000,
        }
    }

    pub fn with_max_length(mut self, max_length: i64) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn dlq_stream(&self) -> &str {
        &self.dlq_stream
    }

    /// Record a failed job. `job_data` is the raw job JSON when it could be parsed.
    pub async fn move_to_dlq(
        &self,
        job_id: &str,
        job_data: serde_json::Value,
        error: &str,
        original_stream_id: &str,
        delivery_count: u32,
    ) -> Result<String, StreamError> {
        let entry = DlqEntry {
            dlq_id: None,
            job_id: job_id.to_string(),
            job_data,
            error: error.to_string(),
            original_stream_id: original_stream_id.to_string(),
            delivery_count,
            failed_at: Utc::now(),
        };

        let data = serde_json::to_string(&entry)?;
        let mut conn = self.redis.clone();

        let dlq_id: String = redis::cmd("XADD")
            .arg(&self.dlq_stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.max_length)
            .arg("*")
            .arg(DATA_FIELD)
            .arg(&data)
            .query_async(&mut conn)
            .await?;

        warn!(
            job_id = %job_id,
            dlq_id = %dlq_id,
            error = %error,
            delivery_count,
            "Moved job to DLQ"
        );

        Ok(dlq_id)
    }

    pub async fn stats(&self) -> Result<DlqStats, StreamError> {
        let mut conn = self.redis.clone();

        let length: i64 = conn.xlen(&self.dlq_stream).await?;
        let oldest: StreamRangeReply = conn.xrange_count(&self.dlq_stream, "-", "+", 1).await?;
        let newest: StreamRangeReply = conn.xrevrange_count(&self.dlq_stream, "+", "-", 1).await?;

        Ok(DlqStats {
            stream_name: self.dlq_stream.clone(),
            length,
            oldest_entry_id: oldest.ids.first().map(|e| e.id.clone()),
            newest_entry_id: newest.ids.first().map(|e| e.id.clone()),
        })
    }

    /// Oldest-first page of entries starting at `start` (inclusive), or the head when `None`.
    pub async fn list(
        &self,
        count: usize,
        start: Option<&str>,
    ) -> Result<Vec<DlqEntry>, StreamError> {
        let mut conn = self.redis.clone();

        let reply: StreamRangeReply = conn
            .xrange_count(&self.dlq_stream, start.unwrap_or("-"), "+", count)
            .await?;

        Ok(reply
            .ids
            .into_iter()
            .filter_map(|entry| {
                let data: String = entry.get(DATA_FIELD)?;
                let mut parsed: DlqEntry = serde_json::from_str(&data).ok()?;
                parsed.dlq_id = Some(entry.id);
                Some(parsed)
            })
            .collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    /// Entry ID inside the DLQ stream; filled in when reading back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dlq_id: Option<String>,
    pub job_id: String,
    pub job_data: serde_json::Value,
    pub error: String,
    pub original_stream_id: String,
    pub delivery_count: u32,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqStats {
    pub stream_name: String,
    pub length: i64,
    pub oldest_entry_id: Option<String>,
    pub newest_entry_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dlq_entry_serialization() {
        let entry = DlqEntry {
            dlq_id: None,
            job_id: "job-1".to_string(),
            job_data: serde_json::json!({"type": "broadcast"}),
            error: "provider rejected recipient".to_string(),
            original_stream_id: "1234567890123-0".to_string(),
            delivery_count: 3,
            failed_at: Utc::now(),
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("dlq_id"));

        let deserialized: DlqEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.job_id, "job-1");
        assert_eq!(deserialized.delivery_count, 3);
        assert!(deserialized.dlq_id.is_none());
    }
}
