use crate::record::LogRecord;
use crate::sink::{LogSink, SinkError};
use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Writes every record as one JSON line to a process stream.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W> JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }
}

impl JsonLinesSink<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl JsonLinesSink<tokio::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(tokio::io::stderr())
    }
}

#[async_trait]
impl<W> LogSink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.writer.lock().await.write_all(&line).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.writer.lock().await.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Level;
    use chrono::Utc;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn writes_one_json_object_per_line() {
        let sink = JsonLinesSink::new(Vec::<u8>::new());
        let mut fields = BTreeMap::new();
        fields.insert("requestId".to_string(), serde_json::json!("r-1"));
        let record = LogRecord {
            name: "svc".into(),
            environment: "dev".into(),
            pid: 1,
            level: Level::Info,
            msg: "Response finished".into(),
            time: Utc::now(),
            fields,
        };

        sink.send(&record).await.unwrap();
        sink.send(&record).await.unwrap();

        let out = sink.writer.into_inner();
        let lines: Vec<&[u8]> = out.split(|b| *b == b'\n').filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_slice(lines[0]).unwrap();
        assert_eq!(parsed["requestId"], "r-1");
        assert_eq!(parsed["msg"], "Response finished");
    }
}
