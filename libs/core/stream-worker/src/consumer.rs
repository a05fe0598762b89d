//! Consumer-group reads, acknowledgements and pending-entry reclaiming.

use crate::config::WorkerConfig;
use crate::error::StreamError;
use crate::event::StreamEvent;
use crate::worker::StreamJob;
use redis::aio::ConnectionManager;
use redis::streams::{StreamAutoClaimReply, StreamId, StreamReadReply};
use redis::{AsyncCommands, RedisResult};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Field name carrying the JSON job payload in every stream entry.
pub(crate) const JOB_FIELD: &str = "job";

/// An entry whose payload could not be decoded into the job type.
#[derive(Debug, Clone)]
pub struct MalformedEntry {
    pub stream_id: String,
    pub raw: Option<String>,
    pub error: String,
    pub delivery_count: u32,
}

/// Result of one read: decodable events plus entries that can never be processed.
#[derive(Debug)]
pub struct ReadBatch<J: StreamJob> {
    pub events: Vec<StreamEvent<J>>,
    pub malformed: Vec<MalformedEntry>,
}

impl<J: StreamJob> ReadBatch<J> {
    fn empty() -> Self {
        Self {
            events: Vec::new(),
            malformed: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.malformed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len() + self.malformed.len()
    }
}

pub struct StreamConsumer {
    redis: ConnectionManager,
    config: WorkerConfig,
}

impl StreamConsumer {
    pub fn new(redis: ConnectionManager, config: WorkerConfig) -> Self {
        Self { redis, config }
    }

    pub fn redis(&self) -> ConnectionManager {
        self.redis.clone()
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Create the consumer group (and the stream) unless it already exists.
    pub async fn init_consumer_group(&self) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();

        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => {
                info!(
                    stream = %self.config.stream_name,
                    group = %self.config.consumer_group,
                    "Created consumer group"
                );
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(group = %self.config.consumer_group, "Consumer group already exists");
                Ok(())
            }
            Err(e) => Err(StreamError::Redis(e)),
        }
    }

    /// Read messages never delivered to any consumer of the group.
    pub async fn read_new<J: StreamJob>(&self) -> Result<ReadBatch<J>, StreamError> {
        let mut conn = self.redis.clone();

        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_id)
            .arg("COUNT")
            .arg(self.config.batch_size);
        if let Some(block) = self.config.block_ms {
            cmd.arg("BLOCK").arg(block);
        }
        cmd.arg("STREAMS").arg(&self.config.stream_name).arg(">");

        let reply: Option<StreamReadReply> = cmd.query_async(&mut conn).await?;

        let mut batch = ReadBatch::empty();
        for key in reply.map(|r| r.keys).unwrap_or_default() {
            for entry in key.ids {
                decode_into(&mut batch, entry, 1);
            }
        }
        Ok(batch)
    }

    /// Take over entries that have been pending longer than `claim_idle_ms`,
    /// whichever consumer they were delivered to.
    pub async fn claim_idle<J: StreamJob>(&self) -> Result<ReadBatch<J>, StreamError> {
        let mut conn = self.redis.clone();

        let reply: StreamAutoClaimReply = redis::cmd("XAUTOCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_id)
            .arg(self.config.claim_idle_ms)
            .arg("0-0")
            .arg("COUNT")
            .arg(self.config.batch_size)
            .query_async(&mut conn)
            .await?;

        if !reply.deleted_ids.is_empty() {
            debug!(count = reply.deleted_ids.len(), "Dropped pending entries deleted from stream");
        }

        let mut batch = ReadBatch::empty();
        for entry in reply.claimed {
            let deliveries = self.delivery_count(&entry.id).await?;
            decode_into(&mut batch, entry, deliveries);
        }

        if !batch.is_empty() {
            warn!(count = batch.len(), "Reclaimed idle pending messages");
        }
        Ok(batch)
    }

    /// Delivery counter of a pending entry (XAUTOCLAIM already counted the claim).
    async fn delivery_count(&self, stream_id: &str) -> Result<u32, StreamError> {
        let mut conn = self.redis.clone();

        let pending: Vec<(String, String, u64, u64)> = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(stream_id)
            .arg(stream_id)
            .arg(1)
            .query_async(&mut conn)
            .await?;

        Ok(pending
            .first()
            .map(|(_, _, _, delivered)| *delivered as u32)
            .unwrap_or(1))
    }

    pub async fn ack(&self, stream_id: &str) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();

        let _: i64 = conn
            .xack(
                &self.config.stream_name,
                &self.config.consumer_group,
                &[stream_id],
            )
            .await?;

        debug!(stream_id = %stream_id, "Acknowledged message");
        Ok(())
    }

    pub async fn stream_info(&self) -> Result<StreamInfo, StreamError> {
        let mut conn = self.redis.clone();

        let length: i64 = conn.xlen(&self.config.stream_name).await?;

        let summary: RedisResult<(i64, Option<String>, Option<String>, Option<Vec<(String, String)>>)> =
            redis::cmd("XPENDING")
                .arg(&self.config.stream_name)
                .arg(&self.config.consumer_group)
                .query_async(&mut conn)
                .await;

        Ok(StreamInfo {
            stream_name: self.config.stream_name.clone(),
            consumer_group: self.config.consumer_group.clone(),
            length,
            pending_count: summary.map(|(count, ..)| count).unwrap_or(0),
        })
    }
}

fn decode_into<J: StreamJob>(batch: &mut ReadBatch<J>, entry: StreamId, delivery_count: u32) {
    let raw: Option<String> = entry.get(JOB_FIELD);

    match raw.as_deref().map(serde_json::from_str::<J>) {
        Some(Ok(job)) => batch
            .events
            .push(StreamEvent::with_delivery_count(entry.id, job, delivery_count)),
        Some(Err(e)) => {
            warn!(stream_id = %entry.id, error = %e, "Undecodable job payload");
            batch.malformed.push(MalformedEntry {
                stream_id: entry.id,
                raw,
                error: format!("invalid job payload: {e}"),
                delivery_count,
            });
        }
        None => {
            warn!(stream_id = %entry.id, "Stream entry without a job field");
            batch.malformed.push(MalformedEntry {
                stream_id: entry.id,
                raw: None,
                error: format!("missing '{JOB_FIELD}' field"),
                delivery_count,
            });
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamInfo {
    pub stream_name: String,
    pub consumer_group: String,
    pub length: i64,
    pub pending_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
    struct Ping {
        id: String,
    }

    impl StreamJob for Ping {
        fn job_id(&self) -> String {
            self.id.clone()
        }
    }

    fn entry(id: &str, fields: &[(&str, &str)]) -> StreamId {
        let map: HashMap<String, redis::Value> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), redis::Value::BulkString(v.as_bytes().to_vec())))
            .collect();
        StreamId {
            id: id.to_string(),
            map,
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_valid_entry() {
        let mut batch = ReadBatch::<Ping>::empty();
        decode_into(&mut batch, entry("1-0", &[("job", r#"{"id":"p1"}"#)]), 2);

        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].job, Ping { id: "p1".into() });
        assert_eq!(batch.events[0].delivery_count, 2);
        assert!(batch.malformed.is_empty());
    }

    #[test]
    fn test_decode_invalid_payload_is_malformed() {
        let mut batch = ReadBatch::<Ping>::empty();
        decode_into(&mut batch, entry("2-0", &[("job", "{not json")]), 1);

        assert!(batch.events.is_empty());
        assert_eq!(batch.malformed.len(), 1);
        assert_eq!(batch.malformed[0].raw.as_deref(), Some("{not json"));
    }

    #[test]
    fn test_decode_missing_field_is_malformed() {
        let mut batch = ReadBatch::<Ping>::empty();
        decode_into(&mut batch, entry("3-0", &[("data", "{}")]), 1);

        assert_eq!(batch.len(), 1);
        assert!(batch.malformed[0].error.contains("missing"));
    }
}
