use std::fmt;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use super::{misordered, MissingContext, RequestLogger};
use crate::record::Level;
use crate::{REQUEST_ID_FIELD, X_REQUEST_ID};

/// Message of the warning emitted when the header is absent.
pub const MISSING_REQUEST_ID_MSG: &str = "X-Request-ID header not present";

/// Options of [`attach_request_id_to_req`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestIdOptions {
    /// Emit a warning through the request logger when the inbound request
    /// carried no `X-Request-ID`.
    pub warn_if_missing_request_id: bool,
}

impl RequestIdOptions {
    pub fn warn_if_missing(mut self, warn: bool) -> Self {
        self.warn_if_missing_request_id = warn;
        self
    }
}

/// Correlation id of the current request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    fn generate() -> Self {
        RequestId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve the request's correlation id and bind it into its logger.
///
/// A non-empty, UTF-8 `X-Request-ID` header is used verbatim, including
/// non-ASCII values; otherwise a UUID v4 is generated and, when configured,
/// a warning is written first.
pub async fn attach_request_id_to_req(
    State(options): State<RequestIdOptions>,
    mut req: Request,
    next: Next,
) -> Response {
    let inbound = req
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|value| std::str::from_utf8(value.as_bytes()).ok())
        .filter(|value| !value.is_empty())
        .map(|value| RequestId(value.to_string()));

    let Some(RequestLogger(logger)) = req.extensions_mut().get_mut::<RequestLogger>() else {
        return misordered("attach_request_id_to_req");
    };

    let request_id = match inbound {
        Some(id) => id,
        None => {
            let id = RequestId::generate();
            if options.warn_if_missing_request_id {
                logger
                    .event(Level::Warn)
                    .field(REQUEST_ID_FIELD, id.as_str())
                    .emit(MISSING_REQUEST_ID_MSG);
            }
            id
        }
    };

    logger.bind(REQUEST_ID_FIELD, request_id.as_str());
    req.extensions_mut().insert(request_id);
    next.run(req).await
}

impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = MissingContext;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .ok_or(MissingContext("request id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_uuids() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn warning_is_off_by_default() {
        assert!(!RequestIdOptions::default().warn_if_missing_request_id);
        assert!(RequestIdOptions::default().warn_if_missing(true).warn_if_missing_request_id);
    }
}
