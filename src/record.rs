use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Severity of a [`LogRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured entry as it is handed to every configured sink.
///
/// Logger-wide identity (`name`, `environment`, `pid`) is always present;
/// everything else, including `requestId` and `version`, lives in `fields`
/// and is flattened into the top level when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub name: String,
    pub environment: String,
    pub pid: u32,
    pub level: Level,
    pub msg: String,
    pub time: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl LogRecord {
    /// Look up a flattened field such as `requestId`.
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    /// Shorthand for the correlation id bound by the request-id middleware.
    pub fn request_id(&self) -> Option<&str> {
        self.field(crate::REQUEST_ID_FIELD).and_then(|v| v.as_str())
    }
}
