//! Redis Streams worker framework.
//!
//! Jobs are published with [`StreamProducer`] and consumed through a consumer
//! group by [`StreamWorker`], one message at a time. A message is acknowledged
//! only after its processor returns `Ok`. Failed messages stay in the group's
//! pending list and come back through `XAUTOCLAIM` once they have been idle long
//! enough; permanent failures and messages that exhausted their retry budget are
//! written to the dead-letter stream and acknowledged.
//!
//! ```ignore
//! use stream_worker::{StreamDef, StreamWorker, WorkerConfig};
//!
//! struct EmailStream;
//! impl StreamDef for EmailStream {
//!     const STREAM_NAME: &'static str = "email:jobs";
//!     const CONSUMER_GROUP: &'static str = "email_workers";
//!     const DLQ_STREAM: &'static str = "email:dlq";
//! }
//!
//! let config = WorkerConfig::from_stream_def::<EmailStream>().with_env_overrides()?;
//! let worker = StreamWorker::new(redis, processor, config);
//! worker.run(shutdown_rx).await?;
//! ```

mod config;
mod consumer;
mod dlq;
mod error;
mod event;
mod health;
pub mod metrics;
mod producer;
mod registry;
mod worker;

pub use config::WorkerConfig;
pub use consumer::{MalformedEntry, ReadBatch, StreamConsumer, StreamInfo};
pub use dlq::{DlqEntry, DlqManager, DlqStats};
pub use error::{ErrorCategory, StreamError};
pub use event::StreamEvent;
pub use health::{worker_router, HealthState};
pub use metrics::{init_metrics, StreamMetrics};
pub use producer::StreamProducer;
pub use registry::StreamDef;
pub use worker::{Disposition, StreamJob, StreamProcessor, StreamWorker};
