//! Request-lifecycle middleware.
//!
//! # Install order
//! ```text
//! attach_logger_to_req        (outermost)
//!     → attach_request_id_to_req
//!     → log_responses
//!     → application routes
//!     → log_errors            (directly around the routes)
//! ```
//!
//! With axum's `Router::layer` the last layer added is the outermost, so the
//! calls are written in reverse; [`LoggingContext::install`] does this.
//!
//! Every middleware after the first reads the [`RequestLogger`] placed by
//! [`attach_logger_to_req`]. If it is missing the stack was installed in the
//! wrong order and the request is answered with `500` without reaching the
//! handler.
//!
//! [`LoggingContext::install`]: crate::LoggingContext::install

mod attach_logger;
mod errors;
mod request_id;
mod response;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub use attach_logger::{attach_logger_to_req, RequestLogger};
pub use errors::{log_errors, PropagatedError, RequestError};
pub use request_id::{attach_request_id_to_req, RequestId, RequestIdOptions, MISSING_REQUEST_ID_MSG};
pub use response::{log_responses, RESPONSE_FINISHED_MSG};

/// Answer for a request that reached `middleware` without a request logger.
fn misordered(middleware: &'static str) -> Response {
    tracing::error!(
        middleware,
        "request logger missing; attach_logger_to_req must be installed before this middleware"
    );
    (StatusCode::INTERNAL_SERVER_ERROR, "request logger not attached").into_response()
}

/// Rejection of the [`RequestLogger`] and [`RequestId`] extractors.
#[derive(Debug, thiserror::Error)]
#[error("{0} missing from request; is the logging middleware installed?")]
pub struct MissingContext(&'static str);

impl IntoResponse for MissingContext {
    fn into_response(self) -> Response {
        tracing::error!(missing = self.0, "handler requested logging context that was never attached");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
