use crate::record::{Level, LogRecord};
use crate::sink::{LogSink, SinkError};
use async_trait::async_trait;

/// Re-emits records as `tracing` events under the `request_log` target.
///
/// The record's fields travel as one JSON-encoded `fields` value so the
/// host's subscriber decides how to render them.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl LogSink for TracingSink {
    async fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
        let fields = serde_json::to_string(&record.fields)?;
        let request_id = record.request_id().unwrap_or_default();
        match record.level {
            Level::Trace => tracing::trace!(target: "request_log", logger = %record.name, request_id, fields = %fields, "{}", record.msg),
            Level::Debug => tracing::debug!(target: "request_log", logger = %record.name, request_id, fields = %fields, "{}", record.msg),
            Level::Info => tracing::info!(target: "request_log", logger = %record.name, request_id, fields = %fields, "{}", record.msg),
            Level::Warn => tracing::warn!(target: "request_log", logger = %record.name, request_id, fields = %fields, "{}", record.msg),
            Level::Error | Level::Fatal => {
                tracing::error!(target: "request_log", logger = %record.name, request_id, fields = %fields, "{}", record.msg)
            }
        }
        Ok(())
    }
}
