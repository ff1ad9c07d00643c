use crate::record::LogRecord;
use async_trait::async_trait;
use std::error::Error;

/// Error returned by sink I/O.
pub type SinkError = Box<dyn Error + Send + Sync>;

/// Asynchronous destination for [`LogRecord`]s produced by request loggers.
///
/// Implementations transport records to a concrete backend (an in-memory
/// ring buffer, stdout, ClickHouse, etc). The dispatcher calls `send` from
/// its background task; request handling never awaits it.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send a single log record to the underlying backend.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was accepted by the backend.
    /// - `Err(..)` if the backend failed. The dispatcher treats this as a
    ///   transient failure and retries the remainder of the batch with
    ///   backoff, up to the configured number of attempts.
    async fn send(&self, record: &LogRecord) -> Result<(), SinkError>;

    /// Flush any buffered records, if the backend implements buffering.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
