//! A decoded stream entry together with its delivery metadata.

use crate::worker::StreamJob;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct StreamEvent<J: StreamJob> {
    /// Redis stream entry ID (e.g., "1234567890123-0")
    pub stream_id: String,
    pub job: J,
    /// Parsed from the stream ID
    pub timestamp: DateTime<Utc>,
    /// 1 on first delivery; grows each time the entry is reclaimed
    pub delivery_count: u32,
}

impl<J: StreamJob> StreamEvent<J> {
    pub fn new(stream_id: String, job: J) -> Self {
        Self::with_delivery_count(stream_id, job, 1)
    }

    pub fn with_delivery_count(stream_id: String, job: J, delivery_count: u32) -> Self {
        let timestamp = parse_timestamp(&stream_id);
        Self {
            stream_id,
            job,
            timestamp,
            delivery_count: delivery_count.max(1),
        }
    }

    pub fn job_id(&self) -> String {
        self.job.job_id()
    }

    /// Deliveries that already failed before this one.
    pub fn retry_count(&self) -> u32 {
        self.delivery_count.saturating_sub(1)
    }

    pub fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }

    pub fn age_ms(&self) -> i64 {
        (Utc::now() - self.timestamp).num_milliseconds()
    }
}

/// Stream IDs have the form "timestamp_ms-sequence".
pub(crate) fn parse_timestamp(stream_id: &str) -> DateTime<Utc> {
    stream_id
        .split('-')
        .next()
        .and_then(|ts| ts.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Serialize, Deserialize, Debug)]
    struct TestJob {
        id: String,
    }

    impl StreamJob for TestJob {
        fn job_id(&self) -> String {
            self.id.clone()
        }
    }

    #[test]
    fn test_parse_timestamp() {
        let now_ms = Utc::now().timestamp_millis();
        let event = StreamEvent::new(format!("{}-0", now_ms), TestJob { id: "j-1".into() });

        assert!(event.age_ms() < 1000);
        assert!(!event.is_redelivery());
        assert_eq!(event.retry_count(), 0);
    }

    #[test]
    fn test_redelivery() {
        let event = StreamEvent::with_delivery_count(
            "1234567890123-0".to_string(),
            TestJob { id: "j-1".into() },
            3,
        );

        assert!(event.is_redelivery());
        assert_eq!(event.retry_count(), 2);
        assert_eq!(event.timestamp.timestamp_millis(), 1_234_567_890_123);
    }

    #[test]
    fn test_zero_delivery_count_is_clamped() {
        let event = StreamEvent::with_delivery_count("1-0".into(), TestJob { id: "j".into() }, 0);
        assert_eq!(event.delivery_count, 1);
    }
}
