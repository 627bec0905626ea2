//! Reply envelope.
//!
//! The router only talks to replies through the [`Reply`] trait; the
//! concrete wire shape is pluggable. A fresh envelope is minted for every
//! request by a [`ReplyFactory`] configured on the router.
//!
//! The default [`ServeReply`] encodes as
//! `{"response": ..., "error": {"status", "code", "msg"}}` with both
//! fields omitted when absent.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

/// Response envelope contract.
pub trait Reply: Send + 'static {
    /// Store the success payload.
    fn set_response(&mut self, response: Value);

    /// Store an already-normalized error.
    fn set_error(&mut self, err: Error);

    /// The stored error, if any. Its status becomes the HTTP status.
    fn error(&self) -> Option<&Error>;

    /// Serialize the envelope to its wire form.
    fn encode(&self) -> serde_json::Result<Vec<u8>>;
}

/// Mints blank envelopes.
pub type ReplyFactory = Arc<dyn Fn() -> Box<dyn Reply> + Send + Sync>;

/// Build a factory from any `Default` reply type.
pub fn factory<R: Reply + Default>() -> ReplyFactory {
    Arc::new(|| -> Box<dyn Reply> { Box::new(R::default()) })
}

/// Default JSON envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServeReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Error>,
}

impl Reply for ServeReply {
    fn set_response(&mut self, response: Value) {
        self.response = Some(response);
    }

    fn set_error(&mut self, err: Error) {
        self.error = Some(err);
    }

    fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
