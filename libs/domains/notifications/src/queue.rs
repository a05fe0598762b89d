//! Publishing side of the email queue.

use crate::error::NotificationResult;
use crate::models::EmailJob;
use crate::streams::EmailStream;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::sync::{Arc, Mutex};
use stream_worker::StreamProducer;

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Appends a job and returns its queue entry id.
    async fn publish(&self, job: &EmailJob) -> NotificationResult<String>;
}

/// Appends jobs to the `email:jobs` Redis stream.
#[derive(Clone)]
pub struct RedisJobQueue {
    producer: StreamProducer,
}

impl RedisJobQueue {
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            producer: StreamProducer::from_stream_def::<EmailStream>(redis),
        }
    }

    pub fn producer(&self) -> &StreamProducer {
        &self.producer
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn publish(&self, job: &EmailJob) -> NotificationResult<String> {
        Ok(self.producer.send(job).await?)
    }
}

/// Collects published jobs in memory.
#[derive(Clone, Default)]
pub struct InMemoryJobQueue {
    jobs: Arc<Mutex<Vec<EmailJob>>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<EmailJob> {
        self.jobs.lock().map(|jobs| jobs.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().map(|jobs| jobs.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn publish(&self, job: &EmailJob) -> NotificationResult<String> {
        let mut jobs = self
            .jobs
            .lock()
            .map_err(|e| crate::NotificationError::QueueError(e.to_string()))?;
        jobs.push(job.clone());
        Ok(format!("0-{}", jobs.len()))
    }
}
