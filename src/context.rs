use std::sync::Arc;

use axum::{middleware, Router};

use crate::config::LoggingConfig;
use crate::dispatch::{DispatchStats, Dispatcher};
use crate::error::LoggingError;
use crate::logger::{Logger, LoggerCore};
use crate::middleware::{attach_logger_to_req, attach_request_id_to_req, log_errors, log_responses, RequestIdOptions};
use crate::serializers::Serializers;
use crate::stream::make_sink;

/// The logger factory.
///
/// Built once at startup from a [`LoggingConfig`]; every middleware it hands
/// out closes over the same base [`Logger`]. Cloning is cheap and shares
/// that logger.
#[derive(Clone, Debug)]
pub struct LoggingContext {
    base: Logger,
}

impl LoggingContext {
    /// Build sinks, merge serializers and start the dispatcher on the
    /// current Tokio runtime.
    ///
    /// **Errors**
    /// - [`LoggingError::NoStreams`] if no stream is configured.
    /// - [`LoggingError::Sink`] if a stream's sink cannot be constructed.
    /// - [`LoggingError::NoRuntime`] outside a Tokio runtime.
    pub fn new(config: LoggingConfig) -> Result<Self, LoggingError> {
        let LoggingConfig { name, environment, version, serializers, streams, dispatch } = config;

        if streams.is_empty() {
            return Err(LoggingError::NoStreams);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(LoggingError::NoRuntime)?;

        let sinks = streams
            .iter()
            .enumerate()
            .map(|(index, stream)| make_sink(stream).map_err(|source| LoggingError::Sink { index, source }))
            .collect::<Result<Vec<_>, _>>()?;

        // The task drains and exits once the last logger handle is dropped.
        let (dispatcher, _handle) = Dispatcher::spawn(&runtime, sinks, &dispatch);
        let core = LoggerCore {
            name,
            environment,
            pid: std::process::id(),
            version,
            serializers: Serializers::standard().merged(serializers),
            dispatcher,
        };

        Ok(Self { base: Logger::from_core(Arc::new(core)) })
    }

    /// The base logger, for records that are not tied to a request.
    pub fn logger(&self) -> &Logger {
        &self.base
    }

    /// Wait until every record emitted so far has been handed to all sinks
    /// and each sink has been flushed.
    pub async fn flush(&self) {
        self.base_dispatcher().flush().await;
    }

    pub fn stats(&self) -> &DispatchStats {
        self.base_dispatcher().stats()
    }

    /// Records dropped because the dispatcher could not keep up.
    pub fn dropped_records(&self) -> u64 {
        self.stats().dropped()
    }

    fn base_dispatcher(&self) -> &Dispatcher {
        self.base.dispatcher()
    }

    /// Layer the four request middleware around `router` in the required
    /// order: logger, request id and response logging outermost, error
    /// logging directly around the routes.
    ///
    /// Routes added after this call are not covered.
    pub fn install<S>(&self, router: Router<S>, options: RequestIdOptions) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router
            .layer(middleware::from_fn(log_errors))
            .layer(middleware::from_fn(log_responses))
            .layer(middleware::from_fn_with_state(options, attach_request_id_to_req))
            .layer(middleware::from_fn_with_state(self.clone(), attach_logger_to_req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring_buffer::RingBuffer;
    use crate::stream::StreamDescriptor;
    use serde_json::json;

    #[test]
    fn requires_a_runtime() {
        let err = LoggingContext::new(LoggingConfig::new("logger", "dev").with_stream(RingBuffer::new(1)))
            .unwrap_err();
        assert!(matches!(err, LoggingError::NoRuntime(_)));
    }

    #[tokio::test]
    async fn requires_at_least_one_stream() {
        let err = LoggingContext::new(LoggingConfig::new("logger", "dev")).unwrap_err();
        assert!(matches!(err, LoggingError::NoStreams));
    }

    #[cfg(not(feature = "clickhouse"))]
    #[tokio::test]
    async fn sink_construction_failure_names_the_stream() {
        let cfg = LoggingConfig::new("logger", "dev")
            .with_stream(StreamDescriptor::Tracing)
            .with_stream(StreamDescriptor::Clickhouse("clickhouse://h:1/d/t".into()));
        let err = LoggingContext::new(cfg).unwrap_err();
        assert!(matches!(err, LoggingError::Sink { index: 1, .. }));
    }

    #[cfg(feature = "clickhouse")]
    #[tokio::test]
    async fn sink_construction_failure_names_the_stream() {
        let cfg = LoggingConfig::new("logger", "dev")
            .with_stream(StreamDescriptor::Tracing)
            .with_stream(StreamDescriptor::Clickhouse("clickhouse:///missing-host".into()));
        let err = LoggingContext::new(cfg).unwrap_err();
        assert!(matches!(
            err,
            LoggingError::Sink {
                index: 1,
                source: crate::stream::SinkBuildError::Dsn(crate::stream::DsnError::Malformed { .. })
            }
        ));
    }

    #[tokio::test]
    async fn base_logger_writes_to_every_stream() {
        let first = RingBuffer::new(4);
        let second = RingBuffer::new(4);
        let ctx = LoggingContext::new(
            LoggingConfig::new("logger", "dev")
                .with_version(json!("1.2.3"))
                .with_stream(first.clone())
                .with_stream(second.clone()),
        )
        .unwrap();

        ctx.logger().info("service started");
        ctx.flush().await;

        assert_eq!(first.records()[0].msg, "service started");
        assert_eq!(second.records()[0].msg, "service started");
        assert_eq!(ctx.logger().version(), Some(&json!("1.2.3")));
        assert_eq!(ctx.dropped_records(), 0);
        assert_eq!(ctx.stats().emitted(), 1);
        assert_eq!(ctx.stats().failed(), 0);
    }
}
