use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::{body::Body, http::Request, routing::get, Router};
use http_body_util::BodyExt;
use request_log_sink::{
    LogRecord, LogSink, LoggingConfig, LoggingContext, RequestIdOptions, SinkError, StreamDescriptor,
};
use tower::ServiceExt;

/// Example of integrating a completely custom backend by implementing
/// the `LogSink` trait directly. Imagine this talks to some proprietary
/// store for which this crate does not provide a built-in sink.
struct MyCustomDbSink;

#[async_trait]
impl LogSink for MyCustomDbSink {
    async fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
        // Here you would call your own client library for the target store.
        if record.msg == "Response finished" {
            println!(
                "[my-custom-db] {} {} -> {} ({})",
                record.field("method").and_then(|v| v.as_str()).unwrap_or("?"),
                record.field("path").and_then(|v| v.as_str()).unwrap_or("?"),
                record.field("statusCode").map(ToString::to_string).unwrap_or_default(),
                record.request_id().unwrap_or("-"),
            );
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink: Arc<dyn LogSink> = Arc::new(MyCustomDbSink);
    let logging = LoggingContext::new(
        LoggingConfig::new("custom-sink-demo", "dev").with_stream(StreamDescriptor::Custom(sink)),
    )?;

    let app = logging.install(Router::new().route("/", get(|| async { "ok" })), RequestIdOptions::default());

    let n: u64 = 10_000;
    let start = Instant::now();
    for i in 0..n {
        let request = Request::builder()
            .uri("/")
            .header("X-Request-ID", format!("demo-{i}"))
            .body(Body::empty())?;
        let response = app.clone().oneshot(request).await?;
        response.into_body().collect().await?;
    }
    let elapsed = start.elapsed();
    logging.flush().await;

    let stats = logging.stats();
    println!(
        "served {} requests in {:?} (~{:.0} req/s), records emitted: {}, dropped: {}, failed: {}",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        stats.emitted(),
        stats.dropped(),
        stats.failed()
    );
    Ok(())
}
