use crate::config::DispatchConfig;
use crate::record::LogRecord;
use crate::sink::{LogSink, SinkError};
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Duration, Instant};

enum Command {
    Record(LogRecord),
    Flush(oneshot::Sender<()>),
}

/// Fan-out from loggers to sinks through a bounded channel and one
/// background task.
///
/// `emit` never blocks and never awaits: when the channel is full the record
/// is dropped and counted. Records leave the channel in the order they were
/// emitted, and each batch is handed to every sink in that order.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    sender: mpsc::Sender<Command>,
    stats: Arc<DispatchStats>,
}

/// Counters shared between loggers and the background task.
#[derive(Debug, Default)]
pub struct DispatchStats {
    emitted: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

impl Dispatcher {
    /// Spawn the background task on `runtime` and return the sending half.
    pub(crate) fn spawn(
        runtime: &tokio::runtime::Handle,
        sinks: Vec<Arc<dyn LogSink>>,
        config: &DispatchConfig,
    ) -> (Self, JoinHandle<()>) {
        let config = config.clamped();
        let (tx, mut rx) = mpsc::channel::<Command>(config.channel_buffer);
        let stats = Arc::new(DispatchStats::default());
        let stats_bg = Arc::clone(&stats);

        let handle = runtime.spawn(async move {
            let mut batch = Vec::with_capacity(config.batch_size);
            // Set when the first record enters an empty batch; later records
            // do not push it back.
            let mut deadline: Option<Instant> = None;
            loop {
                tokio::select! {
                    command = rx.recv() => match command {
                        Some(Command::Record(record)) => {
                            if batch.is_empty() {
                                deadline = Some(Instant::now() + config.flush_interval);
                            }
                            batch.push(record);
                            if batch.len() >= config.batch_size {
                                send_batch(&sinks, &mut batch, &config, &stats_bg).await;
                                deadline = None;
                            }
                        }
                        Some(Command::Flush(done)) => {
                            send_batch(&sinks, &mut batch, &config, &stats_bg).await;
                            deadline = None;
                            flush_sinks(&sinks).await;
                            let _ = done.send(());
                        }
                        None => {
                            send_batch(&sinks, &mut batch, &config, &stats_bg).await;
                            flush_sinks(&sinks).await;
                            break;
                        }
                    },
                    _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                        send_batch(&sinks, &mut batch, &config, &stats_bg).await;
                        deadline = None;
                    }
                }
            }
        });

        (Self { sender: tx, stats }, handle)
    }

    pub(crate) fn emit(&self, record: LogRecord) {
        self.stats.emitted.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.sender.try_send(Command::Record(record)) {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "channel full",
                mpsc::error::TrySendError::Closed(_) => "dispatcher stopped",
            };
            tracing::warn!(reason, "dropping log record");
        }
    }

    /// Wait until everything emitted before this call reached the sinks.
    pub(crate) async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.sender.send(Command::Flush(done_tx)).await.is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    pub(crate) fn stats(&self) -> &DispatchStats {
        &self.stats
    }
}

async fn send_batch(
    sinks: &[Arc<dyn LogSink>],
    batch: &mut Vec<LogRecord>,
    config: &DispatchConfig,
    stats: &DispatchStats,
) {
    if batch.is_empty() {
        return;
    }
    for sink in sinks {
        if let Err(e) = send_with_retry(&**sink, batch, config).await {
            stats.failed.fetch_add(batch.len() as u64, Ordering::Relaxed);
            tracing::warn!(error = %e, records = batch.len(), "log sink gave up on batch");
        }
    }
    batch.clear();
}

/// Deliver `batch` to one sink, resuming after the last accepted record on
/// every retry.
async fn send_with_retry(
    sink: &dyn LogSink,
    batch: &[LogRecord],
    config: &DispatchConfig,
) -> Result<(), SinkError> {
    let mut backoff = config.base_backoff;
    let mut next = 0;
    let mut attempt = 1;
    loop {
        let mut last_err = None;
        while next < batch.len() {
            match sink.send(&batch[next]).await {
                Ok(()) => next += 1,
                Err(e) => {
                    last_err = Some(e);
                    break;
                }
            }
        }

        let Some(err) = last_err else {
            return Ok(());
        };
        if attempt >= config.max_attempts {
            return Err(err);
        }

        tracing::debug!(error = %err, attempt, delay = ?backoff, "log sink send failed, retrying");
        sleep(backoff).await;
        backoff = std::cmp::min(backoff * 2, config.max_backoff);
        attempt += 1;
    }
}

async fn flush_sinks(sinks: &[Arc<dyn LogSink>]) {
    for sink in sinks {
        if let Err(e) = sink.flush().await {
            tracing::warn!(error = %e, "log sink flush failed");
        }
    }
}

impl DispatchStats {
    /// Records handed to the dispatcher, dropped or not.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Records dropped because the channel was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Records a sink gave up on after exhausting its retries, counted once
    /// per sink.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}
