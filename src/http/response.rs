//! Response writing.
//!
//! # Responsibilities
//! - Buffer status, headers and body written by handlers and middleware
//! - Encode reply envelopes and mirror the error status on the response
//! - Carry raw transport responses through untouched
//!
//! # Design Decisions
//! - First status written wins; writing a body implies 200
//! - An envelope that fails to encode becomes a 500 whose body is the
//!   encoder's message, since no envelope can be produced
//! - Headers set by middleware are merged into raw responses only where the
//!   raw response did not set them itself

use std::collections::HashSet;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::{BoxError, Error};
use crate::reply::{Reply, ReplyFactory};

const JSON_UTF8: &str = "application/json; charset=UTF-8";

/// Buffered response handed through the middleware chain.
pub struct ResponseWriter {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    json_header_set: bool,
    raw: Option<Response>,
    reply: ReplyFactory,
}

impl ResponseWriter {
    /// Create an empty writer that mints envelopes from `reply`.
    pub fn new(reply: ReplyFactory) -> Self {
        Self {
            status: None,
            headers: HeaderMap::new(),
            body: Vec::new(),
            json_header_set: false,
            raw: None,
            reply,
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Status written so far, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match &self.raw {
            Some(raw) => Some(raw.status()),
            None => self.status,
        }
    }

    /// Set the response status. Later calls are ignored.
    pub fn write_header(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        } else {
            tracing::debug!(%status, "superfluous write_header call ignored");
        }
    }

    /// Append bytes to the body, implying 200 when no status was written.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(bytes);
        bytes.len()
    }

    /// Serialize `value` as JSON and append it to the body.
    pub fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) -> serde_json::Result<()> {
        let bytes = serde_json::to_vec(value)?;
        if !self.json_header_set {
            self.headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            self.json_header_set = true;
        }
        self.write(&bytes);
        Ok(())
    }

    /// Mint a blank envelope of the configured shape.
    pub fn new_reply(&self) -> Box<dyn Reply> {
        (self.reply)()
    }

    /// Wrap `response` in a fresh envelope and write it.
    pub fn write_response<T: Serialize>(&mut self, response: &T) -> serde_json::Result<usize> {
        let value = serde_json::to_value(response)?;
        let mut reply = self.new_reply();
        if !value.is_null() {
            reply.set_response(value);
        }
        self.write_reply(reply.as_ref())
    }

    /// Normalize `err`, wrap it in a fresh envelope and write it.
    pub fn write_error(&mut self, err: impl Into<BoxError>) {
        let mut reply = self.new_reply();
        reply.set_error(Error::normalize(err));
        // Envelopes holding only an error are expected to encode.
        if let Err(e) = self.write_reply(reply.as_ref()) {
            tracing::error!(error = %e, "failed to encode error reply");
        }
    }

    /// Encode `reply` and write it with a status derived from its error.
    pub fn write_reply(&mut self, reply: &dyn Reply) -> serde_json::Result<usize> {
        match reply.encode() {
            Ok(bytes) => {
                self.headers
                    .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_UTF8));
                let status = reply
                    .error()
                    .map(Error::status_code)
                    .unwrap_or(StatusCode::OK);
                self.write_header(status);
                Ok(self.write(&bytes))
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to encode reply envelope");
                self.write_header(StatusCode::INTERNAL_SERVER_ERROR);
                self.write(e.to_string().as_bytes());
                Err(e)
            }
        }
    }

    /// Carry a response produced outside the envelope machinery.
    pub(crate) fn set_raw(&mut self, response: Response) {
        self.raw = Some(response);
    }
}

impl IntoResponse for ResponseWriter {
    fn into_response(self) -> Response {
        if let Some(mut raw) = self.raw {
            let preset: HashSet<HeaderName> = raw.headers().keys().cloned().collect();
            let mut last = None;
            for (name, value) in self.headers {
                if let Some(name) = name {
                    last = Some(name);
                }
                if let Some(name) = last.as_ref().filter(|name| !preset.contains(*name)) {
                    raw.headers_mut().append(name.clone(), value);
                }
            }
            return raw;
        }

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

/// Encode a reply straight into a response, outside any writer.
pub(crate) fn encode_reply(reply: &dyn Reply) -> Response {
    let mut writer = ResponseWriter::new(crate::reply::factory::<crate::reply::ServeReply>());
    let _ = writer.write_reply(reply);
    writer.into_response()
}
