//! Request context handed to handlers and middleware.
//!
//! # Responsibilities
//! - Carry path variables, headers and the buffered body of one request
//! - Expose the route the path matcher resolved (if any)
//! - Rebuild the underlying transport request for raw handlers
//!
//! # Design Decisions
//! - The body is buffered once, before middleware runs, so decoding and
//!   raw handlers see the same bytes
//! - One context per request; never shared across requests

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{self, request::Parts, HeaderMap, Method, Uri};

use crate::http::vars::Vars;
use crate::routing::route::Route;

/// How the path matcher resolved a request.
#[derive(Clone)]
pub(crate) enum Resolution {
    Matched(Arc<Route>),
    NotFound,
    MethodNotAllowed,
}

/// Per-request context.
pub struct Request {
    vars: Vars,
    parts: Parts,
    body: Bytes,
    resolution: Resolution,
}

impl Request {
    pub(crate) fn new(parts: Parts, body: Bytes, vars: Vars, resolution: Resolution) -> Self {
        Self {
            vars,
            parts,
            body,
            resolution,
        }
    }

    /// Path variables captured by the matched route.
    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    /// Mutable access to path variables, for synthetic requests.
    pub fn vars_mut(&mut self) -> &mut Vars {
        &mut self.vars
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.parts.headers
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn extensions(&self) -> &http::Extensions {
        &self.parts.extensions
    }

    /// Buffered request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// First value of a query-string parameter, form-urlencoded decoded.
    pub fn query(&self, name: &str) -> Option<String> {
        let query = self.parts.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Route resolved by the path matcher; `None` for unmatched requests.
    pub fn route(&self) -> Option<&Arc<Route>> {
        match &self.resolution {
            Resolution::Matched(route) => Some(route),
            _ => None,
        }
    }

    pub(crate) fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    /// Rebuild the transport request, consuming the context.
    pub fn into_http(self) -> http::Request<Body> {
        http::Request::from_parts(self.parts, Body::from(self.body))
    }
}

/// Synthetic requests for tests and in-process calls. The result has no
/// resolved route and no path variables, so a router's terminal handler
/// answers it as an unknown endpoint (404).
impl From<http::Request<Bytes>> for Request {
    fn from(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        Self::new(parts, body, Vars::new(), Resolution::NotFound)
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("vars", &self.vars)
            .field("body_len", &self.body.len())
            .field("route", &self.route().map(|r| r.key()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(uri: &str, body: &'static str) -> Request {
        http::Request::builder()
            .uri(uri)
            .header("x-trace", "abc")
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap()
            .into()
    }

    #[test]
    fn test_query_decoding() {
        let req = synthetic("/hello?other=1&query=%7B%22value%22%3A%22a+b%22%7D", "");
        assert_eq!(req.query("query").as_deref(), Some(r#"{"value":"a b"}"#));
        assert_eq!(req.query("other").as_deref(), Some("1"));
        assert_eq!(req.query("missing"), None);
    }

    #[test]
    fn test_synthetic_request_accessors() {
        let mut req = synthetic("/users/7", "payload");
        req.vars_mut().set("id", "7");

        assert_eq!(req.vars().int("id"), Some(7));
        assert_eq!(req.headers()["x-trace"], "abc");
        assert_eq!(req.method(), Method::GET);
        assert_eq!(req.body().as_ref(), b"payload");
        assert!(req.route().is_none());
    }

    #[tokio::test]
    async fn test_into_http_keeps_body() {
        let req = synthetic("/raw", "raw bytes");
        let http_req = req.into_http();
        assert_eq!(http_req.uri().path(), "/raw");
        let bytes = axum::body::to_bytes(http_req.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.as_ref(), b"raw bytes");
    }
}
