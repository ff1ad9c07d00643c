use crate::record::LogRecord;
use crate::sink::{LogSink, SinkError};
use crate::stream::DsnError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

/// Configuration for [`ClickHouseSink`].
///
/// The sink talks to ClickHouse over HTTP using the `JSONEachRow` format.
/// Request-scoped fields (`requestId`, `req`, `res`, `err`, ...) are stored
/// as one JSON string column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClickHouseConfig {
    /// Base URL without query, e.g. "http://127.0.0.1:8123"
    pub url: String,
    pub database: String,
    pub table: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ClickHouseConfig {
    /// Parse `clickhouse://[user[:password]@]host[:port][/database[/table]]`.
    ///
    /// Database and table default to `default` and `logs`.
    pub fn from_dsn(dsn: &str) -> Result<Self, DsnError> {
        let malformed = |reason| DsnError::Malformed { dsn: dsn.to_string(), reason };

        let rest = dsn
            .get("clickhouse://".len()..)
            .filter(|_| dsn.to_ascii_lowercase().starts_with("clickhouse://"))
            .ok_or_else(|| DsnError::UnknownScheme(dsn.to_string()))?;

        let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
        let (userinfo, host) = match authority.rsplit_once('@') {
            Some((userinfo, host)) => (Some(userinfo), host),
            None => (None, authority),
        };
        if host.is_empty() {
            return Err(malformed("missing host"));
        }

        let (user, password) = match userinfo {
            Some(info) => match info.split_once(':') {
                Some((user, password)) => (Some(user.to_string()), Some(password.to_string())),
                None => (Some(info.to_string()), None),
            },
            None => (None, None),
        };

        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let database = segments.next().unwrap_or("default").to_string();
        let table = segments.next().unwrap_or("logs").to_string();
        if segments.next().is_some() {
            return Err(malformed("expected at most /database/table"));
        }

        Ok(Self {
            url: format!("http://{host}"),
            database,
            table,
            user,
            password,
        })
    }
}

/// ClickHouse implementation of [`LogSink`] using the HTTP interface.
#[derive(Clone)]
pub struct ClickHouseSink {
    client: Client,
    config: ClickHouseConfig,
}

impl ClickHouseSink {
    pub fn new(config: ClickHouseConfig) -> Self {
        let client = Client::new();
        Self { client, config }
    }

    fn endpoint(&self) -> String {
        let mut query = format!(
            "database={}&query=INSERT%20INTO%20{}%20FORMAT%20JSONEachRow",
            self.config.database, self.config.table
        );

        if let Some(user) = &self.config.user {
            query.push_str(&format!("&user={}", urlencoding::encode(user)));
        }
        if let Some(password) = &self.config.password {
            query.push_str(&format!("&password={}", urlencoding::encode(password)));
        }

        format!("{}/?{}", self.config.url, query)
    }

    fn map_record(&self, record: &LogRecord) -> ClickHouseRow {
        ClickHouseRow {
            timestamp: record.time.to_rfc3339(),
            level: record.level.as_str(),
            name: record.name.clone(),
            environment: record.environment.clone(),
            pid: record.pid,
            message: record.msg.clone(),
            request_id: record.request_id().map(str::to_string),
            fields: serde_json::to_string(&record.fields).unwrap_or_else(|_| "{}".to_string()),
        }
    }
}

#[derive(Serialize)]
struct ClickHouseRow {
    timestamp: String,
    level: &'static str,
    name: String,
    environment: String,
    pid: u32,
    message: String,
    request_id: Option<String>,
    fields: String,
}

#[async_trait]
impl LogSink for ClickHouseSink {
    async fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
        let row = self.map_record(record);
        let body = serde_json::to_string(&row)? + "\n";
        let resp = self.client.post(self.endpoint()).body(body).send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(format!("ClickHouse insert failed with status {}: {}", status, text).into())
        }
    }
}
