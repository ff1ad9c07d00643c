use crate::serializers::Serializers;
use crate::stream::{parse_dsn, DsnError, StreamDescriptor};
use serde_json::Value;
use tokio::time::Duration;

/// Static configuration consumed once by [`LoggingContext::new`].
///
/// **Fields**
/// - `name`: logger identity, written into every record.
/// - `environment`: deployment tag, written into every record.
/// - `version`: optional opaque metadata echoed verbatim into every
///   "Response finished" record.
/// - `serializers`: overrides merged over [`Serializers::standard`]; an
///   entry replaces the default of the same field only.
/// - `streams`: one or more destinations; every record goes to all of them.
/// - `dispatch`: buffering and retry behaviour of the background sender.
///
/// [`LoggingContext::new`]: crate::LoggingContext::new
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub name: String,
    pub environment: String,
    pub version: Option<Value>,
    pub serializers: Serializers,
    pub streams: Vec<StreamDescriptor>,
    pub dispatch: DispatchConfig,
}

impl LoggingConfig {
    pub fn new(name: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            environment: environment.into(),
            version: None,
            serializers: Serializers::new(),
            streams: Vec::new(),
            dispatch: DispatchConfig::default(),
        }
    }

    pub fn with_version(mut self, version: impl Into<Value>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_serializer<F>(mut self, field: impl Into<String>, serializer: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.serializers = self.serializers.with(field, serializer);
        self
    }

    pub fn with_serializers(mut self, serializers: Serializers) -> Self {
        self.serializers = self.serializers.merged(serializers);
        self
    }

    pub fn with_stream(mut self, stream: impl Into<StreamDescriptor>) -> Self {
        self.streams.push(stream.into());
        self
    }

    /// Add a stream described by a DSN such as `stdout://` or
    /// `clickhouse://host:8123/db/table`.
    pub fn with_stream_dsn(self, dsn: &str) -> Result<Self, DsnError> {
        Ok(self.with_stream(parse_dsn(dsn)?))
    }

    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }
}

/// Configuration of the background dispatcher.
///
/// **Fields**
/// - `channel_buffer`: records queued before new ones are dropped.
/// - `batch_size`: records handed to the sinks at once.
/// - `flush_interval`: longest time a partial batch waits.
/// - `max_attempts`: sends per batch before a sink gives up on it.
/// - `base_backoff` / `max_backoff`: exponential retry delay bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            max_attempts: 3,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl DispatchConfig {
    /// Enforce minimal thresholds to avoid degenerate configs.
    pub fn clamped(&self) -> Self {
        Self {
            channel_buffer: self.channel_buffer.max(16),
            batch_size: self.batch_size.max(1),
            flush_interval: self.flush_interval.max(Duration::from_millis(10)),
            max_attempts: self.max_attempts.max(1),
            base_backoff: self.base_backoff,
            max_backoff: self.max_backoff.max(self.base_backoff),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clamping_raises_degenerate_values() {
        let cfg = DispatchConfig {
            channel_buffer: 0,
            batch_size: 0,
            flush_interval: Duration::ZERO,
            max_attempts: 0,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(1),
        }
        .clamped();

        assert_eq!(cfg.channel_buffer, 16);
        assert_eq!(cfg.batch_size, 1);
        assert_eq!(cfg.flush_interval, Duration::from_millis(10));
        assert_eq!(cfg.max_attempts, 1);
        assert_eq!(cfg.max_backoff, Duration::from_millis(50));
    }

    #[test]
    fn builder_collects_streams_and_version() {
        let cfg = LoggingConfig::new("logger", "dev")
            .with_version(json!({"foo": "bar"}))
            .with_stream_dsn("stdout://")
            .unwrap()
            .with_stream(StreamDescriptor::Tracing);

        assert_eq!(cfg.version, Some(json!({"foo": "bar"})));
        assert_eq!(cfg.streams.len(), 2);
        assert!(cfg.with_stream_dsn("ftp://nowhere").is_err());
    }
}
