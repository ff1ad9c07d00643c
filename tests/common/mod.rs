use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use http_body_util::BodyExt;
use request_log_sink::{
    LogRecord, LoggingConfig, LoggingContext, RequestError, RequestIdOptions, RequestLogger, RingBuffer, Serializers,
};
use serde_json::Value;
use tower::ServiceExt;

#[derive(Default)]
pub struct Opts {
    pub serializers: Option<Serializers>,
    pub version: Option<Value>,
    pub warn_if_missing_request_id: bool,
}

pub struct TestApp {
    pub app: Router,
    pub logging: LoggingContext,
    pub ring: RingBuffer,
}

/// Service with `/` (plain success), `/error` (propagated error) and
/// `/handled` (error turned into a response by the handler itself).
pub fn setup_server(opts: Opts) -> TestApp {
    let ring = RingBuffer::new(100);
    let mut config = LoggingConfig::new("logger", "dev").with_stream(ring.clone());
    if let Some(serializers) = opts.serializers {
        config = config.with_serializers(serializers);
    }
    if let Some(version) = opts.version {
        config = config.with_version(version);
    }
    let logging = LoggingContext::new(config).expect("logging context");

    let routes = Router::new()
        .route("/", get(|| async {}))
        .route("/error", get(|| async { Err::<(), _>(RequestError::new("Error!")) }))
        .route(
            "/handled",
            get(|RequestLogger(log): RequestLogger| async move {
                log.warn("recovered");
                (StatusCode::BAD_REQUEST, "bad input")
            }),
        );

    let options = RequestIdOptions::default().warn_if_missing(opts.warn_if_missing_request_id);
    let app = logging.install(routes, options);
    TestApp { app, logging, ring }
}

impl TestApp {
    /// Send a request, drain the response body and wait for the dispatcher.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<LogRecord>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        response.into_body().collect().await.unwrap();
        self.logging.flush().await;
        (status, self.ring.records())
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Vec<LogRecord>) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }
}

pub fn msgs(records: &[LogRecord]) -> Vec<&str> {
    records.iter().map(|r| r.msg.as_str()).collect()
}
