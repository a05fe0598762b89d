//! Prometheus metrics for stream workers.
//!
//! Every series carries `stream` and `processor` labels; failures add `category`.

use metrics::{Label, counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Duration;
use tracing::info;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the global Prometheus recorder. Later calls return the same handle.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    PROMETHEUS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;
        info!("Prometheus metrics initialized");
        Ok(handle)
    })
}

/// `None` until [`init_metrics`] has run.
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

#[derive(Clone)]
pub struct StreamMetrics {
    labels: Vec<Label>,
}

impl StreamMetrics {
    pub fn new(stream_name: impl Into<String>, processor_name: impl Into<String>) -> Self {
        Self {
            labels: vec![
                Label::new("stream", stream_name.into()),
                Label::new("processor", processor_name.into()),
            ],
        }
    }

    fn labels_with(&self, key: &'static str, value: impl Into<String>) -> Vec<Label> {
        let mut labels = self.labels.clone();
        labels.push(Label::new(key, value.into()));
        labels
    }

    pub fn job_received(&self) {
        counter!("stream_worker_jobs_received_total", self.labels.clone()).increment(1);
    }

    pub fn job_processed(&self, duration: Duration) {
        counter!("stream_worker_jobs_processed_total", self.labels_with("status", "success")).increment(1);
        histogram!("stream_worker_job_duration_seconds", self.labels.clone()).record(duration.as_secs_f64());
    }

    pub fn job_failed(&self, category: &str) {
        counter!("stream_worker_job_errors_total", self.labels_with("category", category)).increment(1);
    }

    /// Failed job left pending for a later reclaim.
    pub fn job_left_pending(&self) {
        counter!("stream_worker_jobs_retried_total", self.labels.clone()).increment(1);
    }

    pub fn job_moved_to_dlq(&self) {
        counter!("stream_worker_jobs_dlq_total", self.labels.clone()).increment(1);
    }

    /// Idle pending entries taken over through `XAUTOCLAIM`.
    pub fn messages_claimed(&self, count: usize) {
        counter!("stream_worker_messages_claimed_total", self.labels.clone()).increment(count as u64);
    }
}
