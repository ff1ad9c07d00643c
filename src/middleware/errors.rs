use std::error::Error;
use std::fmt;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::{misordered, RequestLogger};
use crate::record::Level;
use crate::serializers::{raw_error, ERR};

/// Error returned by a route handler.
///
/// Converting it into a response keeps the handler's error attached as a
/// [`PropagatedError`] extension, which is what [`log_errors`] observes.
///
/// ```rust,no_run
/// use request_log_sink::RequestError;
///
/// async fn handler() -> Result<&'static str, RequestError> {
///     let config = std::fs::read_to_string("/etc/app.toml")?;
///     # let _ = config;
///     Ok("ok")
/// }
/// ```
pub struct RequestError {
    status: StatusCode,
    error: Arc<dyn Error + Send + Sync>,
}

impl RequestError {
    /// A `500 Internal Server Error` carrying `error`.
    pub fn new(error: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: Arc::from(error.into()),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl<E> From<E> for RequestError
where
    E: Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Debug for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestError")
            .field("status", &self.status)
            .field("error", &self.error)
            .finish()
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let reason = self.status.canonical_reason().unwrap_or("Error");
        let mut response = (self.status, reason).into_response();
        response.extensions_mut().insert(PropagatedError(self.error));
        response
    }
}

/// An application error travelling with its response.
#[derive(Clone)]
pub struct PropagatedError(Arc<dyn Error + Send + Sync>);

impl PropagatedError {
    pub fn error(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.0
    }
}

impl fmt::Debug for PropagatedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropagatedError").field(&self.0).finish()
    }
}

/// Log the error a route handler propagated, then pass its response on
/// unchanged.
///
/// Install directly around the routes so only errors the application did not
/// turn into a normal response are seen.
pub async fn log_errors(req: Request, next: Next) -> Response {
    let Some(RequestLogger(logger)) = req.extensions().get::<RequestLogger>().cloned() else {
        return misordered("log_errors");
    };

    let response = next.run(req).await;

    if let Some(propagated) = response.extensions().get::<PropagatedError>() {
        logger
            .event(Level::Error)
            .field(ERR, raw_error(propagated.error()))
            .field("statusCode", response.status().as_u16())
            .emit("Error");
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_response_keeps_status_and_error() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such user");
        let response = RequestError::from(err).with_status(StatusCode::NOT_FOUND).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let propagated = response.extensions().get::<PropagatedError>().unwrap();
        assert_eq!(propagated.error().to_string(), "no such user");
    }

    #[test]
    fn string_errors_default_to_internal_server_error() {
        let err = RequestError::new("boom");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
