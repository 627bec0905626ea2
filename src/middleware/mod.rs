//! Middleware chain.
//!
//! # Data Flow
//! ```text
//! request → mw[0] → mw[1] → … → terminal dispatch → … → mw[1] → mw[0] → response
//! ```
//!
//! # Design Decisions
//! - A middleware takes the next handler and returns its replacement
//! - The first registered middleware sees the request first and the
//!   response last
//! - Not calling `next` short-circuits the chain (e.g. CORS preflight)
//! - The chain is composed once when the router is built

pub mod cors;
pub mod logger;

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::{Request, ResponseWriter};

pub use cors::CorsMiddleware;
pub use logger::RequestLogger;

/// Handler shape shared by middleware, typed handlers and fallbacks.
pub type HandlerFunc =
    Arc<dyn Fn(ResponseWriter, Request) -> BoxFuture<'static, ResponseWriter> + Send + Sync>;

/// Box an async function into a [`HandlerFunc`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFunc
where
    F: Fn(ResponseWriter, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ResponseWriter> + Send + 'static,
{
    Arc::new(move |w: ResponseWriter, r: Request| -> BoxFuture<'static, ResponseWriter> {
        Box::pin(f(w, r))
    })
}

/// Wraps the next handler in the chain.
pub trait Middleware: Send + Sync + 'static {
    fn middleware(&self, next: HandlerFunc) -> HandlerFunc;
}

impl<F> Middleware for F
where
    F: Fn(HandlerFunc) -> HandlerFunc + Send + Sync + 'static,
{
    fn middleware(&self, next: HandlerFunc) -> HandlerFunc {
        self(next)
    }
}

/// Wrap `terminal` so that `middlewares[0]` is outermost.
pub(crate) fn compose(middlewares: &[Arc<dyn Middleware>], terminal: HandlerFunc) -> HandlerFunc {
    middlewares
        .iter()
        .rev()
        .fold(terminal, |next, mw| mw.middleware(next))
}
