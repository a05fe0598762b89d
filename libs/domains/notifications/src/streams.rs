//! Stream definition for email jobs.

use stream_worker::StreamDef;

/// `email:jobs`, consumed by the `email_workers` group.
pub struct EmailStream;

impl StreamDef for EmailStream {
    const STREAM_NAME: &'static str = "email:jobs";
    const CONSUMER_GROUP: &'static str = "email_workers";
    const DLQ_STREAM: &'static str = "email:dlq";
    const MAX_LENGTH: i64 = 100_000;

    /// Sends are spaced 650ms apart, so a small batch keeps claim latency low.
    const BATCH_SIZE: usize = 10;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_stream_def() {
        assert_eq!(EmailStream::STREAM_NAME, "email:jobs");
        assert_eq!(EmailStream::CONSUMER_GROUP, "email_workers");
        assert_eq!(EmailStream::DLQ_STREAM, "email:dlq");
        assert_eq!(EmailStream::MAX_LENGTH, 100_000);
    }
}
