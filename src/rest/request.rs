//! Request view handed to filters and operations.
//!
//! # Responsibilities
//! - Buffer the body once so filters and the operation see the same bytes
//! - Decode the query string into name → values
//! - Split the path into non-empty segments for matching

use std::collections::HashMap;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request};
use serde_json::Value;

use crate::rest::error::RestError;
use crate::rest::route::Verb;

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// A fully buffered inbound request.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    method: Method,
    path: String,
    query: HashMap<String, Vec<String>>,
    headers: HeaderMap,
    body: Bytes,
}

impl IncomingRequest {
    /// Build a request by hand; mostly useful in tests.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: HashMap::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Buffer an HTTP request, rejecting bodies larger than `body_limit`.
    pub async fn from_http(request: Request<Body>, body_limit: usize) -> Result<Self, RestError> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, body_limit)
            .await
            .map_err(|e| RestError::BodyRead(e.to_string()))?;

        Ok(Self {
            query: parse_query(parts.uri.query().unwrap_or_default()),
            path: parts.uri.path().to_string(),
            method: parts.method,
            headers: parts.headers,
            body,
        })
    }

    /// Replace the query arguments with those decoded from `query`.
    pub fn with_query(mut self, query: &str) -> Self {
        self.query = parse_query(query);
        self
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Shorthand for a JSON body with the matching content type.
    pub fn with_json(self, body: &Value) -> Self {
        self.with_header(header::CONTENT_TYPE.as_str(), "application/json")
            .with_body(body.to_string())
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The dispatchable verb, or `None` for anything outside GET/POST/PUT/DELETE.
    pub fn verb(&self) -> Option<Verb> {
        Verb::from_method(&self.method)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Non-empty path segments in order.
    pub fn segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }

    pub fn query(&self) -> &HashMap<String, Vec<String>> {
        &self.query
    }

    /// First value supplied for a query argument.
    pub fn query_first(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn request_id(&self) -> Option<&str> {
        self.headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
    }

    /// True when any `Content-Type` header mentions `application/json`.
    pub fn is_json(&self) -> bool {
        self.headers
            .get_all(header::CONTENT_TYPE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.contains("application/json"))
    }

    /// Parse the body when it is declared as JSON.
    ///
    /// Empty bodies and bodies of other content types yield `None`.
    pub fn json_body(&self) -> Result<Option<Value>, RestError> {
        if self.body.is_empty() || !self.is_json() {
            return Ok(None);
        }
        serde_json::from_slice(&self.body)
            .map(Some)
            .map_err(RestError::InvalidBody)
    }
}

fn parse_query(query: &str) -> HashMap<String, Vec<String>> {
    let mut args: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
        args.entry(name.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_skip_empty() {
        let req = IncomingRequest::new(Method::GET, "//orders/42/");
        assert_eq!(req.segments(), vec!["orders", "42"]);
        assert!(IncomingRequest::new(Method::GET, "/").segments().is_empty());
    }

    #[test]
    fn test_query_keeps_repeated_values() {
        let req = IncomingRequest::new(Method::GET, "/search").with_query("tag=a&tag=b&q=hello+world");
        assert_eq!(req.query()["tag"], vec!["a", "b"]);
        assert_eq!(req.query_first("tag"), Some("a"));
        assert_eq!(req.query_first("q"), Some("hello world"));
        assert_eq!(req.query_first("missing"), None);
    }

    #[test]
    fn test_json_body_requires_content_type() {
        let plain = IncomingRequest::new(Method::POST, "/orders").with_body("{\"a\":1}");
        assert!(plain.json_body().unwrap().is_none());

        let json = plain.with_header("content-type", "application/json; charset=utf-8");
        assert_eq!(json.json_body().unwrap(), Some(serde_json::json!({"a": 1})));
    }

    #[test]
    fn test_invalid_json_body() {
        let req = IncomingRequest::new(Method::POST, "/orders")
            .with_header("content-type", "application/json")
            .with_body("not json");
        assert!(matches!(req.json_body(), Err(RestError::InvalidBody(_))));
    }

    #[tokio::test]
    async fn test_from_http_buffers_body() {
        let http = Request::builder()
            .method(Method::PUT)
            .uri("/orders/1?note=x")
            .header("x-request-id", "abc")
            .body(Body::from("payload"))
            .unwrap();
        let req = IncomingRequest::from_http(http, 1024).await.unwrap();
        assert_eq!(req.verb(), Some(Verb::Put));
        assert_eq!(req.path(), "/orders/1");
        assert_eq!(req.query_first("note"), Some("x"));
        assert_eq!(req.request_id(), Some("abc"));
        assert_eq!(&req.body()[..], b"payload");
    }

    #[tokio::test]
    async fn test_from_http_enforces_limit() {
        let http = Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .body(Body::from(vec![0u8; 64]))
            .unwrap();
        let err = IncomingRequest::from_http(http, 16).await.unwrap_err();
        assert!(matches!(err, RestError::BodyRead(_)));
    }
}
