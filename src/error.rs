//! Normalized error model.
//!
//! Every failure that reaches the wire is first turned into an [`Error`]:
//! an HTTP status, a machine-readable code and a human message.
//!
//! # Design Decisions
//! - Constructors are plain functions returning immutable values; no
//!   process-wide error singletons
//! - Optional code/message overrides are builder methods instead of
//!   positional string arguments
//! - `normalize` is idempotent: an `Error` passes through untouched

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reply::{Reply, ServeReply};

/// Boxed error accepted from user handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error carried by the reply envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("[{status}] {msg}")]
pub struct Error {
    /// HTTP status code mirrored on the response.
    pub status: u16,
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub msg: String,
}

impl Error {
    /// Create an error from its three parts.
    pub fn new(status: u16, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            msg: msg.into(),
        }
    }

    /// 400 `bad_request` / "Bad request".
    pub fn bad_request() -> Self {
        Self::new(400, "bad_request", "Bad request")
    }

    /// 404 `not_found` / "Not found".
    pub fn not_found() -> Self {
        Self::new(404, "not_found", "Not found")
    }

    /// 404 `endpoint_not_found` / "Endpoint not found".
    ///
    /// Written when no registered route matches the request path.
    pub fn endpoint_not_found() -> Self {
        Self::new(404, "endpoint_not_found", "Endpoint not found")
    }

    /// 405 `not_allowed` / "Method not allowed".
    pub fn method_not_allowed() -> Self {
        Self::new(405, "not_allowed", "Method not allowed")
    }

    /// 408 `request_timeout` / "Request timed out".
    pub fn request_timeout() -> Self {
        Self::new(408, "request_timeout", "Request timed out")
    }

    /// 500 `internal_error` / "Internal server error".
    pub fn internal() -> Self {
        Self::new(500, "internal_error", "Internal server error")
    }

    /// Replace the machine code, keeping status and message.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Replace the message, keeping status and code.
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.msg = msg.into();
        self
    }

    /// Coerce any error into an [`Error`].
    ///
    /// An `Error` (boxed or not) is returned unchanged; anything else
    /// becomes a Bad Request whose message is the original description.
    pub fn normalize(err: impl Into<BoxError>) -> Self {
        match err.into().downcast::<Error>() {
            Ok(err) => *err,
            Err(other) => Self::bad_request().with_message(other.to_string()),
        }
    }

    /// HTTP status, falling back to 500 when the stored code is not a valid status.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let mut reply = ServeReply::default();
        reply.set_error(self);
        crate::http::response::encode_reply(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("disk on fire")]
    struct DiskError;

    #[test]
    fn test_default_constructors() {
        assert_eq!(Error::bad_request(), Error::new(400, "bad_request", "Bad request"));
        assert_eq!(Error::not_found().code, "not_found");
        assert_eq!(Error::endpoint_not_found().msg, "Endpoint not found");
        assert_eq!(Error::method_not_allowed().status, 405);
        assert_eq!(Error::internal().status, 500);
        assert_eq!(Error::request_timeout().code, "request_timeout");
    }

    #[test]
    fn test_overrides() {
        let err = Error::not_found().with_message("user missing");
        assert_eq!(err, Error::new(404, "not_found", "user missing"));

        let err = Error::bad_request()
            .with_code("invalid_email")
            .with_message("email is malformed");
        assert_eq!(err.status, 400);
        assert_eq!(err.code, "invalid_email");
        assert_eq!(err.msg, "email is malformed");
    }

    #[test]
    fn test_normalize_passes_domain_errors_through() {
        let original = Error::new(418, "teapot", "short and stout");
        assert_eq!(Error::normalize(original.clone()), original);
    }

    #[test]
    fn test_normalize_coerces_foreign_errors() {
        let err = Error::normalize(DiskError);
        assert_eq!(err, Error::new(400, "bad_request", "disk on fire"));

        let err = Error::normalize("value is empty");
        assert_eq!(err.msg, "value is empty");
        assert_eq!(err.code, "bad_request");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs: Vec<BoxError> = vec![
            Box::new(DiskError),
            Box::new(Error::internal()),
            "plain text".into(),
            Box::new(std::io::Error::new(std::io::ErrorKind::Other, "io broke")),
        ];
        for input in inputs {
            let once = Error::normalize(input);
            let twice = Error::normalize(once.clone());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_display_and_status_code() {
        let err = Error::bad_request().with_message("nope");
        assert_eq!(err.to_string(), "[400] nope");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::new(42, "odd", "odd").status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_into_response_uses_default_envelope() {
        let response = Error::not_found().with_message("no such user").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(
            bytes.as_ref(),
            br#"{"error":{"status":404,"code":"not_found","msg":"no such user"}}"#
        );
    }
}
