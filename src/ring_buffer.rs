use crate::record::LogRecord;
use crate::sink::{LogSink, SinkError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Bounded in-memory sink that keeps the most recent records.
///
/// Cloning yields another handle onto the same buffer, so a test can keep
/// one handle while the logger owns the other.
#[derive(Clone, Debug)]
pub struct RingBuffer {
    limit: usize,
    records: Arc<Mutex<VecDeque<LogRecord>>>,
}

impl RingBuffer {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            records: Arc::new(Mutex::new(VecDeque::with_capacity(limit))),
        }
    }

    /// Snapshot of the buffered records, oldest first.
    pub fn records(&self) -> Vec<LogRecord> {
        let guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        guard.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn push(&self, record: LogRecord) {
        let mut guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.len() == self.limit {
            guard.pop_front();
        }
        guard.push_back(record);
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl LogSink for RingBuffer {
    async fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Level;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn record(msg: &str) -> LogRecord {
        LogRecord {
            name: "svc".into(),
            environment: "test".into(),
            pid: 1,
            level: Level::Info,
            msg: msg.into(),
            time: Utc::now(),
            fields: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn keeps_only_the_newest_records() {
        let ring = RingBuffer::new(2);
        for msg in ["a", "b", "c"] {
            ring.send(&record(msg)).await.unwrap();
        }

        let msgs: Vec<_> = ring.records().into_iter().map(|r| r.msg).collect();
        assert_eq!(msgs, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn clones_share_the_buffer() {
        let ring = RingBuffer::default();
        let handle = ring.clone();
        ring.send(&record("shared")).await.unwrap();
        assert_eq!(handle.len(), 1);
        handle.clear();
        assert!(ring.is_empty());
    }
}
