//! Handler classification.
//!
//! Any handler passed to the router is turned, once and at registration
//! time, into a [`BoundHandler`]: one of three calling conventions holding
//! a type-erased invocation closure plus a [`Signature`] describing the
//! argument and result shapes.
//!
//! | Convention | Handler shape |
//! |---|---|
//! | raw transport | `async fn(http::Request<Body>) -> impl IntoResponse` |
//! | typed handler | `async fn(ResponseWriter, Request) -> ResponseWriter` |
//! | argument mapped | `async fn() -> O`, `async fn(Request) -> O`, `async fn(A) -> O`, `async fn(Request, A) -> O` |
//!
//! where `A: DeserializeOwned + Default` is decoded from the request and
//! `O: IntoOutcome`.
//!
//! # Design Decisions
//! - The convention is picked by the compiler through the marker type
//!   parameter of [`IntoRoute`]; nothing is inspected per request
//! - Handlers with more than two parameters or return values have no
//!   `IntoRoute` impl, so registering one does not compile:
//!
//! ```compile_fail
//! use rest_dispatch::{Request, Router};
//!
//! #[derive(Default, serde::Deserialize)]
//! struct Args { value: String }
//!
//! async fn three(_req: Request, _a: Args, _b: Args) -> String {
//!     String::new()
//! }
//!
//! let mut router = Router::new();
//! router.get("/three", three);
//! ```
//!
//! The same holds for a third return value:
//!
//! ```compile_fail
//! use rest_dispatch::{Error, Router};
//!
//! async fn three_out() -> (String, Option<Error>, u8) {
//!     (String::new(), None, 0)
//! }
//!
//! let mut router = Router::new();
//! router.get("/three", three_out);
//! ```
//!
//! - `Result<(), E>` is the only error-only return. Every other single
//!   return is a payload, `Option<Error>` included: `Some(err)` is sent as
//!   a 200 response carrying the serialized error

use std::any::{type_name, TypeId};
use std::future::Future;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error as ThisError;

use crate::error::{BoxError, Error};
use crate::http::{Request, ResponseWriter};
use crate::middleware::{handler_fn, HandlerFunc};

/// Calling convention, fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    /// Receives the transport request and answers with its own response.
    RawTransport,
    /// Receives the framework writer and request context.
    TypedHandler,
    /// Receives decoded arguments; results are wrapped in the reply envelope.
    ArgumentMapped,
}

/// Names a Rust type captured at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDescriptor {
    name: &'static str,
}

impl TypeDescriptor {
    pub fn of<T: ?Sized>() -> Self {
        Self {
            name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Shape of an argument-mapped handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signature {
    /// Decoded argument type; `None` when the handler takes no argument or
    /// only the request context.
    pub args: Option<TypeDescriptor>,
    /// Declared result type; `None` for error-only and unit returns.
    pub result: Option<TypeDescriptor>,
    /// Number of parameters (0..=2).
    pub inputs: u8,
    /// Number of logical return values (0..=2).
    pub outputs: u8,
}

/// Failures inside argument-mapped dispatch.
#[derive(Debug, ThisError)]
pub enum ExecError {
    /// The argument payload did not match the declared shape.
    #[error("argument decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The handler result could not be serialized.
    #[error("response encode failed: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Response/error pair produced by an argument-mapped handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub response: Option<Value>,
    pub error: Option<Error>,
}

impl Outcome {
    /// Serialize `value` as the response. `null` counts as no response.
    pub fn payload<T: Serialize + ?Sized>(value: &T) -> Result<Self, ExecError> {
        let value = serde_json::to_value(value).map_err(ExecError::Encode)?;
        Ok(Self {
            response: (!value.is_null()).then_some(value),
            error: None,
        })
    }

    /// Normalize `err` into the error slot.
    pub fn failure(err: impl Into<BoxError>) -> Self {
        Self {
            response: None,
            error: Some(Error::normalize(err)),
        }
    }
}

/// Return shapes accepted from argument-mapped handlers.
pub trait IntoOutcome: Send + 'static {
    /// Number of logical return values.
    fn outputs() -> u8;

    /// Declared result type, if the shape has one.
    fn result_type() -> Option<TypeDescriptor>;

    fn into_outcome(self) -> Result<Outcome, ExecError>;
}

fn result_descriptor<T: 'static>() -> Option<TypeDescriptor> {
    if TypeId::of::<T>() == TypeId::of::<()>() {
        None
    } else {
        Some(TypeDescriptor::of::<T>())
    }
}

impl IntoOutcome for () {
    fn outputs() -> u8 {
        0
    }

    fn result_type() -> Option<TypeDescriptor> {
        None
    }

    fn into_outcome(self) -> Result<Outcome, ExecError> {
        Ok(Outcome::default())
    }
}

/// `Result<(), E>` is error-only; `Result<T, E>` carries a response and an error.
impl<T, E> IntoOutcome for Result<T, E>
where
    T: Serialize + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    fn outputs() -> u8 {
        if Self::result_type().is_some() {
            2
        } else {
            1
        }
    }

    fn result_type() -> Option<TypeDescriptor> {
        result_descriptor::<T>()
    }

    fn into_outcome(self) -> Result<Outcome, ExecError> {
        match self {
            Ok(value) => Outcome::payload(&value),
            Err(err) => Ok(Outcome::failure(err)),
        }
    }
}

/// Response and error produced side by side. The error wins when both are set.
impl<T, E> IntoOutcome for (T, Option<E>)
where
    T: Serialize + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    fn outputs() -> u8 {
        2
    }

    fn result_type() -> Option<TypeDescriptor> {
        result_descriptor::<T>()
    }

    fn into_outcome(self) -> Result<Outcome, ExecError> {
        let (value, err) = self;
        let mut outcome = Outcome::payload(&value)?;
        outcome.error = err.map(Error::normalize);
        Ok(outcome)
    }
}

/// `None` means no response. `Some` is always a payload, even when `T` is
/// [`Error`].
impl<T: Serialize + Send + 'static> IntoOutcome for Option<T> {
    fn outputs() -> u8 {
        1
    }

    fn result_type() -> Option<TypeDescriptor> {
        Some(TypeDescriptor::of::<T>())
    }

    fn into_outcome(self) -> Result<Outcome, ExecError> {
        match self {
            Some(value) => Outcome::payload(&value),
            None => Ok(Outcome::default()),
        }
    }
}

impl<T: Serialize + Send + 'static> IntoOutcome for Json<T> {
    fn outputs() -> u8 {
        1
    }

    fn result_type() -> Option<TypeDescriptor> {
        Some(TypeDescriptor::of::<T>())
    }

    fn into_outcome(self) -> Result<Outcome, ExecError> {
        Outcome::payload(&self.0)
    }
}

impl<T: Serialize + Send + 'static> IntoOutcome for Vec<T> {
    fn outputs() -> u8 {
        1
    }

    fn result_type() -> Option<TypeDescriptor> {
        Some(TypeDescriptor::of::<Self>())
    }

    fn into_outcome(self) -> Result<Outcome, ExecError> {
        Outcome::payload(&self)
    }
}

macro_rules! payload_outcome {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoOutcome for $ty {
                fn outputs() -> u8 {
                    1
                }

                fn result_type() -> Option<TypeDescriptor> {
                    Some(TypeDescriptor::of::<$ty>())
                }

                fn into_outcome(self) -> Result<Outcome, ExecError> {
                    Outcome::payload(&self)
                }
            }
        )*
    };
}

payload_outcome!(
    String, &'static str, Value, bool, char, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize,
    f32, f64,
);

/// Marker types selecting an [`IntoRoute`] impl.
pub mod marker {
    /// Raw transport handlers.
    pub struct Raw;
    /// Typed writer/context handlers.
    pub struct Typed;
    /// Argument-mapped handlers.
    pub struct Mapped;
    /// A parameter receiving the request context.
    pub struct Context;
    /// A parameter decoded from the request payload.
    pub struct Decoded;
}

/// A parameter of a one-argument mapped handler.
pub trait FromInput<M>: Sized + Send + 'static {
    /// Decoded argument type, or `None` when the request context is passed.
    fn descriptor() -> Option<TypeDescriptor>;

    fn from_input(req: Request, payload: Option<&[u8]>) -> Result<Self, ExecError>;
}

impl FromInput<marker::Context> for Request {
    fn descriptor() -> Option<TypeDescriptor> {
        None
    }

    fn from_input(req: Request, _payload: Option<&[u8]>) -> Result<Self, ExecError> {
        Ok(req)
    }
}

impl<T> FromInput<marker::Decoded> for T
where
    T: DeserializeOwned + Default + Send + 'static,
{
    fn descriptor() -> Option<TypeDescriptor> {
        Some(TypeDescriptor::of::<T>())
    }

    fn from_input(_req: Request, payload: Option<&[u8]>) -> Result<Self, ExecError> {
        decode(payload)
    }
}

/// Decode `payload` as `T`; a missing or empty payload yields `T::default()`.
pub(crate) fn decode<T: DeserializeOwned + Default>(payload: Option<&[u8]>) -> Result<T, ExecError> {
    match payload {
        Some(raw) if !raw.is_empty() => serde_json::from_slice(raw).map_err(ExecError::Decode),
        _ => Ok(T::default()),
    }
}

pub(crate) type RawHandler =
    Arc<dyn Fn(http::Request<Body>) -> BoxFuture<'static, Response> + Send + Sync>;

pub(crate) type MappedHandler = Arc<
    dyn Fn(Request, Option<Bytes>) -> BoxFuture<'static, Result<Outcome, ExecError>> + Send + Sync,
>;

/// Type-erased invocation for one calling convention.
#[derive(Clone)]
pub(crate) enum Dispatch {
    Raw(RawHandler),
    Typed(HandlerFunc),
    Mapped(MappedHandler),
}

/// A handler classified at registration time.
#[derive(Clone)]
pub struct BoundHandler {
    pub(crate) dispatch: Dispatch,
    pub(crate) signature: Signature,
}

impl BoundHandler {
    pub fn convention(&self) -> Convention {
        match self.dispatch {
            Dispatch::Raw(_) => Convention::RawTransport,
            Dispatch::Typed(_) => Convention::TypedHandler,
            Dispatch::Mapped(_) => Convention::ArgumentMapped,
        }
    }

    pub fn signature(&self) -> Signature {
        self.signature
    }
}

/// Handlers the router can register. `M` is a marker chosen by the compiler.
pub trait IntoRoute<M> {
    fn into_bound(self) -> BoundHandler;
}

impl<F, Fut, Res> IntoRoute<marker::Raw> for F
where
    F: Fn(http::Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Res> + Send + 'static,
    Res: IntoResponse,
{
    fn into_bound(self) -> BoundHandler {
        let raw: RawHandler = Arc::new(move |req: http::Request<Body>| -> BoxFuture<'static, Response> {
            let fut = self(req);
            Box::pin(async move { fut.await.into_response() })
        });
        BoundHandler {
            dispatch: Dispatch::Raw(raw),
            signature: Signature::default(),
        }
    }
}

impl<F, Fut> IntoRoute<marker::Typed> for F
where
    F: Fn(ResponseWriter, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ResponseWriter> + Send + 'static,
{
    fn into_bound(self) -> BoundHandler {
        BoundHandler {
            dispatch: Dispatch::Typed(handler_fn(self)),
            signature: Signature::default(),
        }
    }
}

impl<F, Fut> IntoRoute<(marker::Mapped, ())> for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoOutcome,
{
    fn into_bound(self) -> BoundHandler {
        let mapped: MappedHandler = Arc::new(
            move |_req: Request, _payload: Option<Bytes>| -> BoxFuture<'static, Result<Outcome, ExecError>> {
                let fut = self();
                Box::pin(async move { fut.await.into_outcome() })
            },
        );
        BoundHandler {
            dispatch: Dispatch::Mapped(mapped),
            signature: Signature {
                args: None,
                result: Fut::Output::result_type(),
                inputs: 0,
                outputs: Fut::Output::outputs(),
            },
        }
    }
}

impl<F, Fut, M, A> IntoRoute<(marker::Mapped, M, A)> for F
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoOutcome,
    A: FromInput<M>,
{
    fn into_bound(self) -> BoundHandler {
        let mapped: MappedHandler = Arc::new(
            move |req: Request, payload: Option<Bytes>| -> BoxFuture<'static, Result<Outcome, ExecError>> {
                match A::from_input(req, payload.as_deref()) {
                    Ok(arg) => {
                        let fut = self(arg);
                        Box::pin(async move { fut.await.into_outcome() })
                    }
                    Err(e) => Box::pin(async move { Err(e) }),
                }
            },
        );
        BoundHandler {
            dispatch: Dispatch::Mapped(mapped),
            signature: Signature {
                args: A::descriptor(),
                result: Fut::Output::result_type(),
                inputs: 1,
                outputs: Fut::Output::outputs(),
            },
        }
    }
}

impl<F, Fut, A> IntoRoute<(marker::Mapped, marker::Context, marker::Decoded, A)> for F
where
    F: Fn(Request, A) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoOutcome,
    A: DeserializeOwned + Default + Send + 'static,
{
    fn into_bound(self) -> BoundHandler {
        let mapped: MappedHandler = Arc::new(
            move |req: Request, payload: Option<Bytes>| -> BoxFuture<'static, Result<Outcome, ExecError>> {
                match decode::<A>(payload.as_deref()) {
                    Ok(arg) => {
                        let fut = self(req, arg);
                        Box::pin(async move { fut.await.into_outcome() })
                    }
                    Err(e) => Box::pin(async move { Err(e) }),
                }
            },
        );
        BoundHandler {
            dispatch: Dispatch::Mapped(mapped),
            signature: Signature {
                args: Some(TypeDescriptor::of::<A>()),
                result: Fut::Output::result_type(),
                inputs: 2,
                outputs: Fut::Output::outputs(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
    struct EchoArg {
        value: String,
    }

    async fn no_args() -> &'static str {
        "Hello, world!"
    }

    async fn unit() {}

    async fn context_only(req: Request) -> Option<String> {
        req.vars().string("msg")
    }

    async fn decoded(arg: EchoArg) -> Result<String, Error> {
        if arg.value.is_empty() {
            return Err(Error::bad_request().with_message("value is empty"));
        }
        Ok(format!("hello, {}", arg.value))
    }

    async fn error_only(arg: EchoArg) -> Result<(), String> {
        if arg.value == "fail" {
            Err("failed on purpose".to_string())
        } else {
            Ok(())
        }
    }

    async fn both(req: Request, arg: EchoArg) -> Json<EchoArg> {
        Json(EchoArg {
            value: format!("{}:{}", req.uri().path(), arg.value),
        })
    }

    async fn raw(_req: http::Request<Body>) -> &'static str {
        "raw"
    }

    async fn typed(w: ResponseWriter, _req: Request) -> ResponseWriter {
        w
    }

    fn request(uri: &str) -> Request {
        http::Request::builder()
            .uri(uri)
            .body(Bytes::new())
            .unwrap()
            .into()
    }

    fn mapped(bound: &BoundHandler) -> MappedHandler {
        match &bound.dispatch {
            Dispatch::Mapped(m) => m.clone(),
            _ => panic!("expected an argument-mapped handler"),
        }
    }

    #[test]
    fn test_conventions() {
        assert_eq!(raw.into_bound().convention(), Convention::RawTransport);
        assert_eq!(typed.into_bound().convention(), Convention::TypedHandler);
        assert_eq!(no_args.into_bound().convention(), Convention::ArgumentMapped);
        assert_eq!(context_only.into_bound().convention(), Convention::ArgumentMapped);
        assert_eq!(both.into_bound().convention(), Convention::ArgumentMapped);
    }

    #[test]
    fn test_signatures() {
        let sig = no_args.into_bound().signature();
        assert_eq!((sig.inputs, sig.outputs), (0, 1));
        assert!(sig.args.is_none());
        assert_eq!(sig.result.map(|d| d.name()), Some("&str"));

        let sig = unit.into_bound().signature();
        assert_eq!((sig.inputs, sig.outputs), (0, 0));
        assert!(sig.result.is_none());

        let sig = context_only.into_bound().signature();
        assert_eq!((sig.inputs, sig.outputs), (1, 1));
        assert!(sig.args.is_none());
        assert_eq!(sig.result.map(|d| d.name()), Some("alloc::string::String"));

        let sig = decoded.into_bound().signature();
        assert_eq!((sig.inputs, sig.outputs), (1, 2));
        assert!(sig.args.unwrap().name().ends_with("EchoArg"));

        let sig = error_only.into_bound().signature();
        assert_eq!((sig.inputs, sig.outputs), (1, 1));
        assert!(sig.result.is_none());

        let sig = both.into_bound().signature();
        assert_eq!((sig.inputs, sig.outputs), (2, 1));
        assert!(sig.args.unwrap().name().ends_with("EchoArg"));
        assert!(sig.result.unwrap().name().ends_with("EchoArg"));
    }

    #[tokio::test]
    async fn test_decoded_invocation() {
        let handler = mapped(&decoded.into_bound());

        let outcome = handler(request("/"), Some(Bytes::from_static(br#"{"value":"bob"}"#)))
            .await
            .unwrap();
        assert_eq!(outcome.response, Some(json!("hello, bob")));
        assert!(outcome.error.is_none());

        let outcome = handler(request("/"), None).await.unwrap();
        assert_eq!(
            outcome.error,
            Some(Error::new(400, "bad_request", "value is empty"))
        );
    }

    #[tokio::test]
    async fn test_decode_failure() {
        let handler = mapped(&decoded.into_bound());
        let result = handler(request("/"), Some(Bytes::from_static(b"{not json"))).await;
        assert!(matches!(result, Err(ExecError::Decode(_))));
    }

    #[tokio::test]
    async fn test_error_only_and_context() {
        let handler = mapped(&error_only.into_bound());
        let outcome = handler(request("/"), Some(Bytes::from_static(br#"{"value":"ok"}"#)))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::default());

        let outcome = handler(request("/"), Some(Bytes::from_static(br#"{"value":"fail"}"#)))
            .await
            .unwrap();
        assert_eq!(outcome.error.unwrap().msg, "failed on purpose");

        let handler = mapped(&both.into_bound());
        let outcome = handler(request("/items"), Some(Bytes::from_static(br#"{"value":"x"}"#)))
            .await
            .unwrap();
        assert_eq!(outcome.response, Some(json!({"value": "/items:x"})));
    }

    #[test]
    fn test_pair_outcome_keeps_both_slots() {
        let outcome = ("partial", Some(Error::internal())).into_outcome().unwrap();
        assert_eq!(outcome.response, Some(json!("partial")));
        assert_eq!(outcome.error, Some(Error::internal()));

        let outcome = (5u8, None::<Error>).into_outcome().unwrap();
        assert_eq!(outcome.response, Some(json!(5)));
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_only_unit_result_is_error_only() {
        let outcome = Err::<(), Error>(Error::not_found()).into_outcome().unwrap();
        assert!(outcome.response.is_none());
        assert_eq!(outcome.error, Some(Error::not_found()));

        let outcome = Some(Error::not_found()).into_outcome().unwrap();
        assert!(outcome.error.is_none());
        assert_eq!(
            outcome.response,
            Some(json!({"status": 404, "code": "not_found", "msg": "Not found"}))
        );
        assert_eq!(<Option<Error> as IntoOutcome>::outputs(), 1);
    }

    #[test]
    fn test_decode_defaults_on_empty_payload() {
        assert_eq!(decode::<EchoArg>(None).unwrap(), EchoArg::default());
        assert_eq!(decode::<EchoArg>(Some(b"")).unwrap(), EchoArg::default());
    }
}
