use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use super::MissingContext;
use crate::context::LoggingContext;
use crate::logger::Logger;

/// The per-request child logger, stored in the request extensions.
///
/// Handlers can extract it directly:
///
/// ```rust,no_run
/// use request_log_sink::RequestLogger;
///
/// async fn handler(RequestLogger(log): RequestLogger) -> &'static str {
///     log.info("handling");
///     "ok"
/// }
/// ```
#[derive(Clone, Debug)]
pub struct RequestLogger(pub Logger);

impl std::ops::Deref for RequestLogger {
    type Target = Logger;

    fn deref(&self) -> &Logger {
        &self.0
    }
}

/// Derive a child of the base logger and attach it to the request.
pub async fn attach_logger_to_req(State(ctx): State<LoggingContext>, mut req: Request, next: Next) -> Response {
    req.extensions_mut().insert(RequestLogger(ctx.logger().child()));
    next.run(req).await
}

impl<S> FromRequestParts<S> for RequestLogger
where
    S: Send + Sync,
{
    type Rejection = MissingContext;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestLogger>()
            .cloned()
            .ok_or(MissingContext("request logger"))
    }
}
