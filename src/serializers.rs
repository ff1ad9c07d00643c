//! Field serializers.
//!
//! A serializer turns the raw JSON view of a request, response or error
//! into what is actually written to the record. Serializers are keyed by
//! field name; whenever a record carries a field with a registered name,
//! the serializer's output replaces the raw value.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use http::{HeaderMap, Method, StatusCode, Uri};
use serde_json::{json, Map, Value};

/// Field name of the request view.
pub const REQ: &str = "req";
/// Field name of the response view.
pub const RES: &str = "res";
/// Field name of the error view.
pub const ERR: &str = "err";

const REDACTED: &str = "[redacted]";
const SENSITIVE_REQUEST_HEADERS: &[&str] = &["authorization", "cookie", "proxy-authorization"];
const SENSITIVE_RESPONSE_HEADERS: &[&str] = &["set-cookie"];

/// Transforms a raw value into its loggable representation.
pub type Serializer = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Field name → serializer map.
#[derive(Clone, Default)]
pub struct Serializers {
    map: BTreeMap<String, Serializer>,
}

impl Serializers {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in `req`, `res` and `err` serializers.
    pub fn standard() -> Self {
        Self::new()
            .with(REQ, request_serializer)
            .with(RES, response_serializer)
            .with(ERR, error_serializer)
    }

    pub fn with<F>(mut self, field: impl Into<String>, serializer: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.map.insert(field.into(), Arc::new(serializer));
        self
    }

    /// Shallow merge: every entry of `overrides` replaces the entry of the
    /// same name, all other entries are kept.
    pub fn merged(mut self, overrides: Serializers) -> Self {
        self.map.extend(overrides.map);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Serializer> {
        self.map.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.map.contains_key(field)
    }

    /// Run the serializer registered for `field`, or return the value as is.
    pub fn apply(&self, field: &str, value: Value) -> Value {
        match self.map.get(field) {
            Some(serializer) => serializer(&value),
            None => value,
        }
    }
}

impl fmt::Debug for Serializers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.map.keys()).finish()
    }
}

/// Raw view of an inbound request.
pub fn raw_request(method: &Method, uri: &Uri, headers: &HeaderMap) -> Value {
    json!({
        "method": method.as_str(),
        "url": uri.to_string(),
        "headers": headers_to_json(headers),
    })
}

/// Raw view of an outbound response.
pub fn raw_response(status: StatusCode, headers: &HeaderMap) -> Value {
    json!({
        "statusCode": status.as_u16(),
        "headers": headers_to_json(headers),
    })
}

/// Raw view of an error and its source chain.
pub fn raw_error(err: &(dyn Error + 'static)) -> Value {
    let mut sources = Vec::new();
    let mut current = err.source();
    while let Some(source) = current {
        sources.push(Value::String(source.to_string()));
        current = source.source();
    }
    json!({
        "message": err.to_string(),
        "debug": format!("{err:?}"),
        "sources": sources,
    })
}

fn headers_to_json(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        match map.get_mut(name.as_str()) {
            Some(Value::String(existing)) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            _ => {
                map.insert(name.as_str().to_string(), Value::String(value));
            }
        }
    }
    Value::Object(map)
}

fn redact_headers(headers: Option<&Value>, sensitive: &[&str]) -> Value {
    let Some(Value::Object(headers)) = headers else {
        return Value::Object(Map::new());
    };
    let redacted = headers
        .iter()
        .map(|(name, value)| {
            if sensitive.iter().any(|s| name.eq_ignore_ascii_case(s)) {
                (name.clone(), Value::String(REDACTED.to_string()))
            } else {
                (name.clone(), value.clone())
            }
        })
        .collect();
    Value::Object(redacted)
}

fn request_serializer(raw: &Value) -> Value {
    let Value::Object(_) = raw else {
        return raw.clone();
    };
    json!({
        "method": raw.get("method").cloned().unwrap_or(Value::Null),
        "url": raw.get("url").cloned().unwrap_or(Value::Null),
        "headers": redact_headers(raw.get("headers"), SENSITIVE_REQUEST_HEADERS),
    })
}

fn response_serializer(raw: &Value) -> Value {
    let Value::Object(_) = raw else {
        return raw.clone();
    };
    json!({
        "statusCode": raw.get("statusCode").cloned().unwrap_or(Value::Null),
        "headers": redact_headers(raw.get("headers"), SENSITIVE_RESPONSE_HEADERS),
    })
}

fn error_serializer(raw: &Value) -> Value {
    let Value::Object(_) = raw else {
        return raw.clone();
    };
    json!({
        "message": raw.get("message").cloned().unwrap_or(Value::Null),
        "sources": raw.get("sources").cloned().unwrap_or_else(|| json!([])),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn override_replaces_only_the_named_field() {
        let merged = Serializers::standard().merged(Serializers::new().with(REQ, |_| json!("bar")));

        assert_eq!(merged.apply(REQ, json!({"method": "GET"})), json!("bar"));
        let res = merged.apply(RES, raw_response(StatusCode::OK, &HeaderMap::new()));
        assert_eq!(res["statusCode"], 200);
        assert!(merged.contains(ERR));
    }

    #[test]
    fn unknown_fields_pass_through() {
        let serializers = Serializers::standard();
        assert_eq!(serializers.apply("user", json!({"id": 1})), json!({"id": 1}));
    }

    #[test]
    fn request_serializer_redacts_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer t0ken"));
        headers.insert("accept", HeaderValue::from_static("text/plain"));
        let raw = raw_request(&Method::POST, &Uri::from_static("/login?next=/"), &headers);

        let out = Serializers::standard().apply(REQ, raw);
        assert_eq!(out["method"], "POST");
        assert_eq!(out["url"], "/login?next=/");
        assert_eq!(out["headers"]["authorization"], REDACTED);
        assert_eq!(out["headers"]["accept"], "text/plain");
    }

    #[test]
    fn repeated_headers_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        headers.append("x-forwarded-for", HeaderValue::from_static("10.0.0.2"));
        let raw = raw_response(StatusCode::OK, &headers);
        assert_eq!(raw["headers"]["x-forwarded-for"], "10.0.0.1, 10.0.0.2");
    }

    #[test]
    fn error_view_walks_the_source_chain() {
        #[derive(Debug)]
        struct Outer(std::io::Error);
        impl fmt::Display for Outer {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("query failed")
            }
        }
        impl Error for Outer {
            fn source(&self) -> Option<&(dyn Error + 'static)> {
                Some(&self.0)
            }
        }

        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "connection reset"));
        let out = Serializers::standard().apply(ERR, raw_error(&err));
        assert_eq!(out["message"], "query failed");
        assert_eq!(out["sources"], json!(["connection reset"]));
        assert!(out.get("debug").is_none());
    }
}
