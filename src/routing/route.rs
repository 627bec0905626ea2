//! Route descriptor and argument-mapped execution.
//!
//! # Responsibilities
//! - Bind one handler to a method and endpoint pattern
//! - Pick the argument payload for a request (`query` parameter, then body)
//! - Run argument-mapped handlers and fill a reply envelope
//!
//! # Design Decisions
//! - The handler is classified once, when the route is created
//! - Decode failures become a plain 400 on the envelope; parser details
//!   are logged, never sent
//! - When a handler produces both a response and an error, only the error
//!   reaches the envelope

use std::fmt;

use axum::body::Bytes;
use axum::http::Method;
use axum::routing::MethodFilter;
use thiserror::Error as ThisError;

use crate::error::Error;
use crate::http::Request;
use crate::reply::Reply;
use crate::routing::handler::{BoundHandler, Convention, Dispatch, ExecError, IntoRoute, Signature};

/// Query-string parameter that carries an encoded argument payload.
pub const QUERY_PARAM: &str = "query";

/// Invalid route registrations.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum RegistrationError {
    #[error("endpoint {0:?} must start with '/'")]
    InvalidEndpoint(String),

    #[error("method {0} cannot be bound by the path matcher")]
    UnsupportedMethod(Method),

    #[error("route {0} is already registered")]
    Duplicate(String),
}

/// One registered handler.
pub struct Route {
    method: Method,
    endpoint: String,
    handler: BoundHandler,
}

impl Route {
    /// Create a route.
    ///
    /// # Panics
    /// On an endpoint not starting with `/` or a method the path matcher
    /// cannot bind. Use [`Route::try_new`] to handle these instead.
    pub fn new<H, M>(method: Method, endpoint: impl Into<String>, handler: H) -> Self
    where
        H: IntoRoute<M>,
    {
        match Self::try_new(method, endpoint, handler) {
            Ok(route) => route,
            Err(e) => panic!("invalid route registration: {e}"),
        }
    }

    pub fn try_new<H, M>(
        method: Method,
        endpoint: impl Into<String>,
        handler: H,
    ) -> Result<Self, RegistrationError>
    where
        H: IntoRoute<M>,
    {
        let endpoint = endpoint.into();
        if !endpoint.starts_with('/') {
            return Err(RegistrationError::InvalidEndpoint(endpoint));
        }
        if MethodFilter::try_from(method.clone()).is_err() {
            return Err(RegistrationError::UnsupportedMethod(method));
        }

        let handler = handler.into_bound();
        tracing::debug!(
            method = %method,
            endpoint = %endpoint,
            convention = ?handler.convention(),
            signature = ?handler.signature(),
            "route created"
        );
        Ok(Self {
            method,
            endpoint,
            handler,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn convention(&self) -> Convention {
        self.handler.convention()
    }

    /// Argument and result shapes. Empty unless the route is argument mapped.
    pub fn signature(&self) -> Signature {
        self.handler.signature()
    }

    /// Route table key, `METHOD:endpoint`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.method, self.endpoint)
    }

    pub(crate) fn dispatch(&self) -> &Dispatch {
        &self.handler.dispatch
    }

    /// Run an argument-mapped handler and fill `reply` with its outcome.
    ///
    /// Routes of other conventions leave `reply` untouched. The only error
    /// returned is a failure to serialize the handler's result.
    pub async fn exec(
        &self,
        req: Request,
        mut reply: Box<dyn Reply>,
    ) -> Result<Box<dyn Reply>, serde_json::Error> {
        let Dispatch::Mapped(handler) = &self.handler.dispatch else {
            tracing::debug!(route = %self.key(), "exec called on a route that is not argument mapped");
            return Ok(reply);
        };

        let payload = if self.handler.signature.args.is_some() {
            payload(&req)
        } else {
            None
        };

        match handler(req, payload).await {
            Ok(outcome) => match outcome.error {
                Some(err) => reply.set_error(err),
                None => {
                    if let Some(response) = outcome.response {
                        reply.set_response(response);
                    }
                }
            },
            Err(ExecError::Decode(e)) => {
                tracing::debug!(route = %self.key(), error = %e, "argument decode failed");
                reply.set_error(Error::bad_request());
            }
            Err(ExecError::Encode(e)) => return Err(e),
        }
        Ok(reply)
    }
}

/// Encoded argument for `req`: a non-empty `query` parameter wins over a
/// non-empty body.
fn payload(req: &Request) -> Option<Bytes> {
    if let Some(query) = req.query(QUERY_PARAM).filter(|q| !q.is_empty()) {
        return Some(Bytes::from(query));
    }
    if !req.body().is_empty() {
        return Some(req.body().clone());
    }
    None
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("endpoint", &self.endpoint)
            .field("convention", &self.convention())
            .field("signature", &self.signature())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ResponseWriter;
    use crate::reply::ServeReply;
    use axum::http;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Default, Deserialize)]
    struct HelloArg {
        value: String,
    }

    #[derive(Debug, Serialize)]
    struct Conflicted {
        partial: bool,
    }

    async fn hello(arg: HelloArg) -> Result<String, Error> {
        if arg.value.is_empty() {
            return Err(Error::bad_request().with_message("value is empty"));
        }
        Ok(format!("Hello, {}!", arg.value))
    }

    async fn both_set(_arg: HelloArg) -> (Conflicted, Option<Error>) {
        (Conflicted { partial: true }, Some(Error::internal()))
    }

    async fn null_response() -> Option<String> {
        None
    }

    fn request(uri: &str, body: &'static str) -> Request {
        http::Request::builder()
            .uri(uri)
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap()
            .into()
    }

    async fn run(route: &Route, req: Request) -> String {
        let reply = route
            .exec(req, Box::new(ServeReply::default()))
            .await
            .unwrap();
        String::from_utf8(reply.encode().unwrap()).unwrap()
    }

    #[test]
    fn test_registration_errors() {
        let err = Route::try_new(Method::GET, "hello", hello).unwrap_err();
        assert_eq!(err, RegistrationError::InvalidEndpoint("hello".into()));

        let custom = Method::from_bytes(b"PURGE").unwrap();
        let err = Route::try_new(custom.clone(), "/hello", hello).unwrap_err();
        assert_eq!(err, RegistrationError::UnsupportedMethod(custom));
    }

    #[test]
    #[should_panic(expected = "invalid route registration")]
    fn test_new_panics_on_invalid_endpoint() {
        Route::new(Method::GET, "", hello);
    }

    #[test]
    fn test_descriptor() {
        let route = Route::new(Method::POST, "/hello", hello);
        assert_eq!(route.key(), "POST:/hello");
        assert_eq!(route.convention(), Convention::ArgumentMapped);
        assert_eq!(route.signature().inputs, 1);
        assert_eq!(route.signature().outputs, 2);

        let typed = Route::new(Method::GET, "/typed", |w: ResponseWriter, _r: Request| async move { w });
        assert_eq!(typed.convention(), Convention::TypedHandler);
        assert_eq!(typed.signature(), Signature::default());
    }

    #[tokio::test]
    async fn test_query_param_takes_priority() {
        let route = Route::new(Method::POST, "/hello", hello);
        let req = request(
            "/hello?query=%7B%22value%22%3A%22query%22%7D",
            r#"{"value":"body"}"#,
        );
        assert_eq!(run(&route, req).await, r#"{"response":"Hello, query!"}"#);
    }

    #[tokio::test]
    async fn test_empty_query_falls_back_to_body() {
        let route = Route::new(Method::POST, "/hello", hello);
        let req = request("/hello?query=", r#"{"value":"body"}"#);
        assert_eq!(run(&route, req).await, r#"{"response":"Hello, body!"}"#);
    }

    #[tokio::test]
    async fn test_missing_payload_passes_default() {
        let route = Route::new(Method::POST, "/hello", hello);
        let body = run(&route, request("/hello", "")).await;
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            value,
            json!({"error": {"status": 400, "code": "bad_request", "msg": "value is empty"}})
        );
    }

    #[tokio::test]
    async fn test_malformed_payload_hides_parser_detail() {
        let route = Route::new(Method::POST, "/hello", hello);
        let body = run(&route, request("/hello", "{\"value\": ")).await;
        assert_eq!(
            body,
            r#"{"error":{"status":400,"code":"bad_request","msg":"Bad request"}}"#
        );
    }

    #[tokio::test]
    async fn test_error_is_authoritative() {
        let route = Route::new(Method::GET, "/both", both_set);
        let body = run(&route, request("/both", "")).await;
        assert!(!body.contains("partial"));
        assert!(body.contains("internal_error"));
    }

    #[tokio::test]
    async fn test_null_response_is_absent() {
        let route = Route::new(Method::GET, "/none", null_response);
        assert_eq!(run(&route, request("/none", "")).await, "{}");
    }
}
