use axum::{routing::get, Router};
use request_log_sink::{LoggingConfig, LoggingContext, RequestError, RequestIdOptions, RequestLogger, StreamDescriptor};
use serde_json::json;

async fn hello(RequestLogger(log): RequestLogger) -> &'static str {
    log.info("saying hello");
    "hello\n"
}

async fn fail() -> Result<&'static str, RequestError> {
    let config = std::fs::read_to_string("/definitely/not/here.toml")?;
    let _ = config;
    Ok("unreachable\n")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Crate diagnostics (dropped records, sink failures) go through tracing.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let logging = LoggingContext::new(
        LoggingConfig::new("basic-demo", "dev")
            .with_version(json!({"commit": "dev", "build": 1}))
            .with_stream(StreamDescriptor::Stdout),
    )?;

    let routes = Router::new().route("/", get(hello)).route("/error", get(fail));
    let app = logging.install(routes, RequestIdOptions::default().warn_if_missing(true));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    logging.logger().info("listening on http://127.0.0.1:3000");
    axum::serve(listener, app).await?;
    Ok(())
}
