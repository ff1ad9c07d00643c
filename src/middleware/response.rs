use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use serde_json::Value;

use super::{misordered, RequestLogger};
use crate::logger::Logger;
use crate::record::Level;
use crate::serializers::{raw_request, raw_response, REQ, RES};

/// Message of the per-request completion record.
pub const RESPONSE_FINISHED_MSG: &str = "Response finished";

/// Log one "Response finished" record when the response body completes.
///
/// The record is written when the server has pulled the whole body. A body
/// that is dropped half-way (client went away) or fails produces no record.
///
/// HEAD is the exception: servers drop a HEAD body without polling it, so
/// dropping it counts as completion. A HEAD request whose connection goes
/// away before the response head is written is therefore still logged.
pub async fn log_responses(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let Some(RequestLogger(logger)) = req.extensions().get::<RequestLogger>().cloned() else {
        return misordered("log_responses");
    };

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let raw_req = raw_request(req.method(), req.uri(), req.headers());

    let response = next.run(req).await;

    let status = response.status();
    let hook = FinishHook {
        logger,
        started,
        fire_on_drop: method == Method::HEAD,
        method,
        path,
        status,
        raw_req,
        raw_res: raw_response(status, response.headers()),
    };

    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(FinishBody { inner: body, hook: Some(hook) }))
}

struct FinishHook {
    logger: Logger,
    started: Instant,
    method: Method,
    path: String,
    status: StatusCode,
    raw_req: Value,
    raw_res: Value,
    // HEAD bodies are discarded by the server without being polled, so an
    // abort and a completed write look the same from here.
    fire_on_drop: bool,
}

impl FinishHook {
    fn fire(self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let logger = &self.logger;
        logger
            .event(Level::Info)
            .field("method", self.method.as_str())
            .field("path", self.path)
            .field("statusCode", self.status.as_u16())
            .field("responseTime", elapsed_ms)
            .field(REQ, self.raw_req)
            .field(RES, self.raw_res)
            .field_opt("version", logger.version().cloned())
            .emit(RESPONSE_FINISHED_MSG);
    }
}

/// Response body that runs its [`FinishHook`] at most once, on completion.
struct FinishBody {
    inner: Body,
    hook: Option<FinishHook>,
}

impl FinishBody {
    fn finish(&mut self) {
        if let Some(hook) = self.hook.take() {
            hook.fire();
        }
    }
}

impl HttpBody for FinishBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) => this.finish(),
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => this.finish(),
            Poll::Ready(Some(Err(_))) => this.hook = None,
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for FinishBody {
    fn drop(&mut self) {
        // Servers may skip polling a body that reports end-of-stream up front.
        let unpolled_but_done = self.inner.is_end_stream()
            || self.hook.as_ref().is_some_and(|hook| hook.fire_on_drop);
        if unpolled_but_done {
            self.finish();
        }
    }
}
