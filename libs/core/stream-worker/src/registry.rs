//! Stream definitions.
//!
//! Each domain names its stream, consumer group and dead-letter stream once,
//! and both the producer side and the worker side are built from it.

/// Static description of one job stream.
///
/// ```rust,ignore
/// pub struct EmailStream;
///
/// impl StreamDef for EmailStream {
///     const STREAM_NAME: &'static str = "email:jobs";
///     const CONSUMER_GROUP: &'static str = "email_workers";
///     const DLQ_STREAM: &'static str = "email:dlq";
/// }
/// ```
pub trait StreamDef: Send + Sync {
    const STREAM_NAME: &'static str;
    const CONSUMER_GROUP: &'static str;
    const DLQ_STREAM: &'static str;

    /// Approximate MAXLEN applied on every XADD.
    const MAX_LENGTH: i64 = 100_000;

    /// Messages fetched per XREADGROUP / XAUTOCLAIM call.
    const BATCH_SIZE: usize = 10;

    /// Minimum idle time before a pending message is reclaimed and redelivered.
    const CLAIM_IDLE_MS: u64 = 30_000;

    /// BLOCK timeout for XREADGROUP.
    const BLOCK_MS: u64 = 5_000;
}
