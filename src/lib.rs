//! Type-directed HTTP handler dispatch on top of axum.
//!
//! Register plain async functions and the router works out how to call
//! them: raw transport handlers, typed writer/context handlers, or handlers
//! whose argument is decoded from the `query` parameter or request body and
//! whose result is wrapped in a JSON reply envelope.
//!
//! ```no_run
//! use rest_dispatch::{Error, Request, Router};
//!
//! #[derive(Default, serde::Deserialize)]
//! struct EchoArg {
//!     value: String,
//! }
//!
//! async fn echo(arg: EchoArg) -> Result<String, Error> {
//!     if arg.value.is_empty() {
//!         return Err(Error::bad_request().with_message("value is empty"));
//!     }
//!     Ok(format!("hello, {}", arg.value))
//! }
//!
//! async fn shout(req: Request) -> Option<String> {
//!     req.vars().string("msg").map(|m| m.to_uppercase())
//! }
//!
//! # async fn run() -> std::io::Result<()> {
//! let mut router = Router::new();
//! router.post("/echo", echo);
//! router.get("/shout/{msg}", shout);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3303").await?;
//! axum::serve(listener, router.build()).await
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod middleware;
pub mod observability;
pub mod reply;
pub mod routing;

pub use config::ServerConfig;
pub use error::{BoxError, Error};
pub use http::{HttpServer, Request, ResponseWriter, Vars};
pub use lifecycle::Shutdown;
pub use middleware::{handler_fn, HandlerFunc, Middleware};
pub use reply::{Reply, ReplyFactory, ServeReply};
pub use routing::{Convention, IntoRoute, Route, Router, Signature};
