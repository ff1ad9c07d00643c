//! Structured logger handed to every request.
//!
//! A [`Logger`] is a cheap handle: the identity, serializers and dispatcher
//! live in one shared core built by the factory, while each handle owns its
//! own set of bound fields. [`Logger::child`] copies the bound fields, so a
//! child can bind more (such as `requestId`) without the parent or any
//! sibling seeing them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::dispatch::Dispatcher;
use crate::record::{Level, LogRecord};
use crate::serializers::Serializers;

pub(crate) struct LoggerCore {
    pub(crate) name: String,
    pub(crate) environment: String,
    pub(crate) pid: u32,
    pub(crate) version: Option<Value>,
    pub(crate) serializers: Serializers,
    pub(crate) dispatcher: Dispatcher,
}

#[derive(Clone)]
pub struct Logger {
    core: Arc<LoggerCore>,
    fields: BTreeMap<String, Value>,
}

impl Logger {
    pub(crate) fn from_core(core: Arc<LoggerCore>) -> Self {
        Self { core, fields: BTreeMap::new() }
    }

    /// Derive a logger with the same sinks and serializers and a copy of
    /// the bound fields.
    pub fn child(&self) -> Logger {
        self.clone()
    }

    /// Bind a default field written into every later record of this logger.
    /// A serializer registered for `key` is applied once, here.
    pub fn bind(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = self.core.serializers.apply(&key, value.into());
        self.fields.insert(key, value);
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bind(key, value);
        self
    }

    pub fn bound(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.core.dispatcher
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// The configured version metadata, if any.
    pub fn version(&self) -> Option<&Value> {
        self.core.version.as_ref()
    }

    /// Start a record with per-call fields.
    pub fn event(&self, level: Level) -> Event<'_> {
        Event { logger: self, level, fields: BTreeMap::new() }
    }

    pub fn debug(&self, msg: impl Into<String>) {
        self.event(Level::Debug).emit(msg);
    }

    pub fn info(&self, msg: impl Into<String>) {
        self.event(Level::Info).emit(msg);
    }

    pub fn warn(&self, msg: impl Into<String>) {
        self.event(Level::Warn).emit(msg);
    }

    pub fn error(&self, msg: impl Into<String>) {
        self.event(Level::Error).emit(msg);
    }

    fn write(&self, level: Level, msg: String, call_fields: BTreeMap<String, Value>) {
        let mut fields = self.fields.clone();
        fields.extend(call_fields);
        let record = LogRecord {
            name: self.core.name.clone(),
            environment: self.core.environment.clone(),
            pid: self.core.pid,
            level,
            msg,
            time: Utc::now(),
            fields,
        };
        self.core.dispatcher.emit(record);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.core.name)
            .field("environment", &self.core.environment)
            .field("fields", &self.fields)
            .finish()
    }
}

/// A record under construction; nothing is written until [`Event::emit`].
#[must_use = "an event is only written when `emit` is called"]
pub struct Event<'a> {
    logger: &'a Logger,
    level: Level,
    fields: BTreeMap<String, Value>,
}

impl Event<'_> {
    /// Add a field; a serializer registered for `key` transforms the value.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = self.logger.core.serializers.apply(&key, value.into());
        self.fields.insert(key, value);
        self
    }

    /// Add a field only when a value is present.
    pub fn field_opt(self, key: impl Into<String>, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.field(key, value),
            None => self,
        }
    }

    pub fn emit(self, msg: impl Into<String>) {
        self.logger.write(self.level, msg.into(), self.fields);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::DispatchConfig;
    use crate::ring_buffer::RingBuffer;
    use crate::sink::LogSink;
    use serde_json::json;

    pub(crate) fn test_logger(ring: &RingBuffer, serializers: Serializers) -> Logger {
        let sinks: Vec<Arc<dyn LogSink>> = vec![Arc::new(ring.clone())];
        let (dispatcher, _handle) =
            Dispatcher::spawn(&tokio::runtime::Handle::current(), sinks, &DispatchConfig::default());
        Logger::from_core(Arc::new(LoggerCore {
            name: "logger".into(),
            environment: "dev".into(),
            pid: std::process::id(),
            version: None,
            serializers,
            dispatcher,
        }))
    }

    async fn drain(logger: &Logger) {
        logger.core.dispatcher.flush().await;
    }

    #[tokio::test]
    async fn child_fields_do_not_leak_to_parent_or_siblings() {
        let ring = RingBuffer::new(10);
        let base = test_logger(&ring, Serializers::standard());
        let mut a = base.child();
        let b = base.child();
        a.bind("requestId", "a-1");

        a.info("from a");
        b.info("from b");
        base.info("from base");
        drain(&base).await;

        let records = ring.records();
        assert_eq!(records[0].request_id(), Some("a-1"));
        assert_eq!(records[1].request_id(), None);
        assert_eq!(records[2].request_id(), None);
        assert_eq!(records[0].name, "logger");
        assert_eq!(records[0].environment, "dev");
    }

    #[tokio::test]
    async fn event_fields_go_through_serializers() {
        let ring = RingBuffer::new(10);
        let logger = test_logger(&ring, Serializers::standard().merged(Serializers::new().with("user", |v| json!({"id": v["id"]}))));

        logger
            .event(Level::Warn)
            .field("user", json!({"id": 7, "password": "hunter2"}))
            .field("attempt", 3)
            .field_opt("missing", None::<String>)
            .emit("login throttled");
        drain(&logger).await;

        let record = &ring.records()[0];
        assert_eq!(record.level, Level::Warn);
        assert_eq!(record.msg, "login throttled");
        assert_eq!(record.field("user"), Some(&json!({"id": 7})));
        assert_eq!(record.field("attempt"), Some(&json!(3)));
        assert!(record.field("missing").is_none());
    }

    #[tokio::test]
    async fn call_site_fields_override_bound_fields() {
        let ring = RingBuffer::new(10);
        let logger = test_logger(&ring, Serializers::new()).with_field("component", "router");

        logger.event(Level::Info).field("component", "handler").emit("override");
        logger.info("bound");
        drain(&logger).await;

        let records = ring.records();
        assert_eq!(records[0].field("component"), Some(&json!("handler")));
        assert_eq!(records[1].field("component"), Some(&json!("router")));
    }
}
