//! Job and processor traits plus the serial worker loop.

use crate::config::WorkerConfig;
use crate::consumer::{ReadBatch, StreamConsumer};
use crate::dlq::DlqManager;
use crate::error::StreamError;
use crate::event::StreamEvent;
use crate::metrics::StreamMetrics;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// A job payload carried in a stream entry.
///
/// Retry state lives in the consumer group (delivery counter), not in the payload,
/// so a job is immutable once published.
pub trait StreamJob: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    fn job_id(&self) -> String;
}

/// Domain handler for one job type.
///
/// ```rust,ignore
/// #[async_trait]
/// impl StreamProcessor<EmailJob> for EmailDeliveryProcessor {
///     async fn process(&self, job: &EmailJob) -> Result<(), StreamError> {
///         self.deliver(job).await
///     }
///
///     fn name(&self) -> &'static str {
///         "email_delivery"
///     }
/// }
/// ```
#[async_trait]
pub trait StreamProcessor<J: StreamJob>: Send + Sync {
    /// `Ok` acknowledges the message. An error leaves it pending for redelivery
    /// unless it is permanent or the retry budget is spent.
    async fn process(&self, job: &J) -> Result<(), StreamError>;

    fn name(&self) -> &'static str;

    async fn health_check(&self) -> Result<bool, StreamError> {
        Ok(true)
    }

    /// Called once after a job has been written to the DLQ.
    async fn on_dead_letter(&self, _job: &J, _error: &str) {}
}

/// What the worker does with a message after one processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    /// Leave pending; XAUTOCLAIM hands it out again once idle.
    Retry,
    DeadLetter,
}

impl Disposition {
    pub fn decide(result: &Result<(), StreamError>, delivery_count: u32) -> Self {
        match result {
            Ok(()) => Disposition::Ack,
            Err(e) if e.should_retry(delivery_count.saturating_sub(1)) => Disposition::Retry,
            Err(_) => Disposition::DeadLetter,
        }
    }
}

pub struct StreamWorker<J, P>
where
    J: StreamJob,
    P: StreamProcessor<J>,
{
    consumer: StreamConsumer,
    dlq: DlqManager,
    processor: Arc<P>,
    metrics: StreamMetrics,
    config: WorkerConfig,
    _job: PhantomData<J>,
}

impl<J, P> StreamWorker<J, P>
where
    J: StreamJob,
    P: StreamProcessor<J>,
{
    pub fn new(redis: ConnectionManager, processor: P, config: WorkerConfig) -> Self {
        Self::with_arc_processor(redis, Arc::new(processor), config)
    }

    pub fn with_arc_processor(redis: ConnectionManager, processor: Arc<P>, config: WorkerConfig) -> Self {
        let dlq = DlqManager::new(redis.clone(), &config.dlq_stream);
        let metrics = StreamMetrics::new(&config.stream_name, processor.name());
        Self {
            consumer: StreamConsumer::new(redis, config.clone()),
            dlq,
            processor,
            metrics,
            config,
            _job: PhantomData,
        }
    }

    pub fn consumer(&self) -> &StreamConsumer {
        &self.consumer
    }

    /// Run until `shutdown` flips to `true`. Messages are handled one at a time;
    /// the flag is checked between messages so an in-flight job always finishes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), StreamError> {
        info!(
            consumer_id = %self.config.consumer_id,
            stream = %self.config.stream_name,
            group = %self.config.consumer_group,
            processor = %self.processor.name(),
            batch_size = self.config.batch_size,
            claim_idle_ms = self.config.claim_idle_ms,
            "Starting stream worker"
        );

        self.consumer.init_consumer_group().await?;

        let claim_interval = Duration::from_millis(self.config.claim_interval_ms);
        let mut next_claim = Instant::now();
        let mut consecutive_errors: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            if Instant::now() >= next_claim {
                match self.consumer.claim_idle::<J>().await {
                    Ok(batch) if !batch.is_empty() => {
                        self.metrics.messages_claimed(batch.len());
                        self.handle_batch(batch, &shutdown).await;
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Failed to reclaim idle messages"),
                }
                next_claim = Instant::now() + claim_interval;
                continue;
            }

            let read = tokio::select! {
                read = self.consumer.read_new::<J>() => read,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!("Shutdown sender dropped, stopping worker");
                        break;
                    }
                    continue;
                }
            };

            match read {
                Ok(batch) => {
                    if consecutive_errors > 0 {
                        info!(consecutive_errors, "Stream read recovered");
                        consecutive_errors = 0;
                    }
                    if batch.is_empty() {
                        if self.config.block_ms.is_none() {
                            self.idle(&mut shutdown, Duration::from_millis(500)).await;
                        }
                        continue;
                    }
                    self.handle_batch(batch, &shutdown).await;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if e.to_string().contains("NOGROUP") {
                        warn!("Consumer group missing, recreating");
                        if let Err(e) = self.consumer.init_consumer_group().await {
                            error!(error = %e, "Failed to recreate consumer group");
                        }
                    }
                    let backoff = Duration::from_secs(2u64.pow(consecutive_errors.min(5)).min(30));
                    warn!(error = %e, consecutive_errors, backoff_secs = backoff.as_secs(), "Stream read failed, backing off");
                    self.idle(&mut shutdown, backoff).await;
                }
            }
        }

        info!(processor = %self.processor.name(), "Stream worker stopped");
        Ok(())
    }

    async fn idle(&self, shutdown: &mut watch::Receiver<bool>, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = shutdown.changed() => {}
        }
    }

    async fn handle_batch(&self, batch: ReadBatch<J>, shutdown: &watch::Receiver<bool>) {
        for entry in batch.malformed {
            let job_data = entry
                .raw
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null);
            match self
                .dlq
                .move_to_dlq(&entry.stream_id, job_data, &entry.error, &entry.stream_id, entry.delivery_count)
                .await
            {
                Ok(_) => {
                    self.metrics.job_moved_to_dlq();
                    self.ack(&entry.stream_id).await;
                }
                Err(e) => error!(stream_id = %entry.stream_id, error = %e, "Failed to dead-letter malformed entry"),
            }
        }

        for event in batch.events {
            if *shutdown.borrow() {
                debug!(stream_id = %event.stream_id, "Shutdown requested, leaving message pending");
                break;
            }
            self.handle_event(event).await;
        }
    }

    async fn handle_event(&self, event: StreamEvent<J>) {
        let job_id = event.job_id();
        self.metrics.job_received();
        debug!(
            stream_id = %event.stream_id,
            job_id = %job_id,
            delivery_count = event.delivery_count,
            "Processing job"
        );

        let started = Instant::now();
        let result = self.processor.process(&event.job).await;

        match (Disposition::decide(&result, event.delivery_count), result) {
            (Disposition::Ack, _) => {
                self.metrics.job_processed(started.elapsed());
                self.ack(&event.stream_id).await;
            }
            (Disposition::Retry, Err(e)) => {
                self.metrics.job_failed(e.category().as_str());
                self.metrics.job_left_pending();
                warn!(
                    job_id = %job_id,
                    delivery_count = event.delivery_count,
                    error = %e,
                    "Job failed, leaving pending for redelivery"
                );
            }
            (_, Err(e)) => self.dead_letter(&event, &e.to_string(), e.category().as_str()).await,
            (_, Ok(())) => self.ack(&event.stream_id).await,
        }
    }

    async fn dead_letter(&self, event: &StreamEvent<J>, error: &str, category: &str) {
        self.metrics.job_failed(category);

        let job_data = match serde_json::to_value(&event.job) {
            Ok(value) => value,
            Err(e) => {
                error!(job_id = %event.job_id(), error = %e, "Failed to serialize job for DLQ");
                serde_json::Value::Null
            }
        };

        if let Err(e) = self
            .dlq
            .move_to_dlq(&event.job_id(), job_data, error, &event.stream_id, event.delivery_count)
            .await
        {
            // Not acked: the message is reclaimed and dead-lettered on a later pass.
            error!(job_id = %event.job_id(), error = %e, "Failed to write DLQ entry");
            return;
        }

        self.metrics.job_moved_to_dlq();
        self.ack(&event.stream_id).await;
        self.processor.on_dead_letter(&event.job, error).await;
    }

    async fn ack(&self, stream_id: &str) {
        if let Err(e) = self.consumer.ack(stream_id).await {
            error!(stream_id = %stream_id, error = %e, "Failed to acknowledge message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_is_acked() {
        assert_eq!(Disposition::decide(&Ok(()), 1), Disposition::Ack);
        assert_eq!(Disposition::decide(&Ok(()), 7), Disposition::Ack);
    }

    #[test]
    fn test_transient_failure_is_retried_until_budget_spent() {
        let err = || Err(StreamError::transient("provider unavailable"));
        assert_eq!(Disposition::decide(&err(), 1), Disposition::Retry);
        assert_eq!(Disposition::decide(&err(), 3), Disposition::Retry);
        assert_eq!(Disposition::decide(&err(), 4), Disposition::DeadLetter);
    }

    #[test]
    fn test_permanent_failure_goes_straight_to_dlq() {
        let result = Err(StreamError::permanent("invalid recipient"));
        assert_eq!(Disposition::decide(&result, 1), Disposition::DeadLetter);
    }

    #[test]
    fn test_rate_limited_has_larger_budget() {
        let err = || Err(StreamError::rate_limited("429"));
        assert_eq!(Disposition::decide(&err(), 5), Disposition::Retry);
        assert_eq!(Disposition::decide(&err(), 6), Disposition::DeadLetter);
    }
}
