//! Request-lifecycle logging for axum services.
//!
//! A [`LoggingContext`] is built once from a [`LoggingConfig`]. Its
//! middleware give every request a child [`Logger`] and a correlation id,
//! write one "Response finished" record per completed response and an
//! "Error" record for every error a handler propagated. Records are shipped
//! to the configured sinks by a background task.
//!
//! ```rust,no_run
//! use axum::{routing::get, Router};
//! use request_log_sink::{LoggingConfig, LoggingContext, RequestError, RequestIdOptions, StreamDescriptor};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let logging = LoggingContext::new(
//!     LoggingConfig::new("billing", "production")
//!         .with_version(serde_json::json!({"commit": "4f2a9c1"}))
//!         .with_stream(StreamDescriptor::Stdout),
//! )?;
//!
//! let routes = Router::new()
//!     .route("/", get(|| async { "ok" }))
//!     .route("/error", get(|| async { Err::<(), _>(RequestError::new("Error!")) }));
//!
//! let app = logging.install(routes, RequestIdOptions::default().warn_if_missing(true));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod record;
pub mod sink;
pub mod serializers;
pub mod stream;
pub mod ring_buffer;
pub mod stdio_sink;
pub mod tracing_sink;

#[cfg(feature = "clickhouse")]
pub mod clickhouse;

pub mod config;
pub mod middleware;

mod context;
mod dispatch;
mod error;
mod logger;

use axum::http::HeaderName;

pub use config::{DispatchConfig, LoggingConfig};
pub use context::LoggingContext;
pub use dispatch::DispatchStats;
pub use error::LoggingError;
pub use logger::{Event, Logger};
pub use middleware::{
    attach_logger_to_req, attach_request_id_to_req, log_errors, log_responses, PropagatedError, RequestError,
    RequestId, RequestIdOptions, RequestLogger,
};
pub use record::{Level, LogRecord};
pub use ring_buffer::RingBuffer;
pub use serializers::{Serializer, Serializers};
pub use sink::{LogSink, SinkError};
pub use stream::{parse_dsn, StreamDescriptor};

/// Inbound correlation header, matched case-insensitively.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Record field carrying the correlation id.
pub const REQUEST_ID_FIELD: &str = "requestId";
