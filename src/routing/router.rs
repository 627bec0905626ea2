//! Route table and request dispatch.
//!
//! # Data Flow
//! ```text
//! axum path matcher (method + pattern)
//!     → Matched / MethodNotAllowed / NotFound
//!     → buffer body, collect path vars
//!     → middleware chain (first registered outermost)
//!     → terminal: raw | typed | argument mapped | fallback handler
//!     → ResponseWriter → http response
//! ```
//!
//! # Design Decisions
//! - Routes are registered during setup, then frozen by [`Router::build`]
//! - Middleware sees unmatched requests too, so preflight answers work on
//!   paths registered for other methods
//! - Panics inside the chain become a 500 envelope
//! - A chain that outlives the request timeout is dropped and answered
//!   with a 408 envelope

use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{FromRequestParts, RawPathParams};
use axum::http::{self, header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter};
use tower_http::catch_panic::CatchPanicLayer;

use crate::config::schema::DEFAULT_MAX_BODY_SIZE;
use crate::error::Error;
use crate::http::request::Resolution;
use crate::http::response::encode_reply;
use crate::http::{Request, ResponseWriter, Vars};
use crate::middleware::{compose, handler_fn, HandlerFunc, Middleware};
use crate::observability::metrics;
use crate::reply::{factory, Reply, ReplyFactory, ServeReply};
use crate::routing::handler::{Dispatch, IntoRoute};
use crate::routing::route::{RegistrationError, Route};

/// Collects routes, middleware and fallbacks, then builds an `axum::Router`.
pub struct Router {
    routes: BTreeMap<String, Arc<Route>>,
    middlewares: Vec<Arc<dyn Middleware>>,
    not_found: Option<HandlerFunc>,
    method_not_allowed: Option<HandlerFunc>,
    reply: ReplyFactory,
    max_body_size: usize,
    request_timeout: Option<Duration>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: BTreeMap::new(),
            middlewares: Vec::new(),
            not_found: None,
            method_not_allowed: None,
            reply: factory::<ServeReply>(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            request_timeout: None,
        }
    }

    /// Cap on buffered request bodies; larger bodies get a 413 envelope.
    pub fn with_body_limit(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Deadline for the middleware chain and handler. Requests that run
    /// longer get a 408 `request_timeout` envelope.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Register a route.
    ///
    /// # Panics
    /// When a route with the same method and endpoint already exists.
    pub fn add(&mut self, route: Route) -> Arc<Route> {
        match self.try_add(route) {
            Ok(route) => route,
            Err(e) => panic!("invalid route registration: {e}"),
        }
    }

    pub fn try_add(&mut self, route: Route) -> Result<Arc<Route>, RegistrationError> {
        let key = route.key();
        if self.routes.contains_key(&key) {
            return Err(RegistrationError::Duplicate(key));
        }
        let route = Arc::new(route);
        self.routes.insert(key, route.clone());
        Ok(route)
    }

    pub fn get<H, M>(&mut self, endpoint: &str, handler: H) -> Arc<Route>
    where
        H: IntoRoute<M>,
    {
        self.add(Route::new(Method::GET, endpoint, handler))
    }

    pub fn post<H, M>(&mut self, endpoint: &str, handler: H) -> Arc<Route>
    where
        H: IntoRoute<M>,
    {
        self.add(Route::new(Method::POST, endpoint, handler))
    }

    pub fn put<H, M>(&mut self, endpoint: &str, handler: H) -> Arc<Route>
    where
        H: IntoRoute<M>,
    {
        self.add(Route::new(Method::PUT, endpoint, handler))
    }

    pub fn patch<H, M>(&mut self, endpoint: &str, handler: H) -> Arc<Route>
    where
        H: IntoRoute<M>,
    {
        self.add(Route::new(Method::PATCH, endpoint, handler))
    }

    pub fn delete<H, M>(&mut self, endpoint: &str, handler: H) -> Arc<Route>
    where
        H: IntoRoute<M>,
    {
        self.add(Route::new(Method::DELETE, endpoint, handler))
    }

    /// Append a middleware. The first one registered runs outermost.
    pub fn use_middleware<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Replace the default 404 envelope.
    pub fn set_not_found_handler<F, Fut>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(ResponseWriter, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResponseWriter> + Send + 'static,
    {
        self.not_found = Some(handler_fn(handler));
        self
    }

    /// Replace the default 405 envelope.
    pub fn set_method_not_allowed_handler<F, Fut>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(ResponseWriter, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResponseWriter> + Send + 'static,
    {
        self.method_not_allowed = Some(handler_fn(handler));
        self
    }

    /// Use `R` as the reply envelope for every response.
    pub fn set_reply<R: Reply + Default>(&mut self) -> &mut Self {
        self.reply = factory::<R>();
        self
    }

    pub fn set_reply_factory(&mut self, reply: ReplyFactory) -> &mut Self {
        self.reply = reply;
        self
    }

    /// Registered route for `method` and `endpoint` pattern.
    pub fn find(&self, method: &Method, endpoint: &str) -> Option<&Arc<Route>> {
        self.routes.get(&format!("{method}:{endpoint}"))
    }

    /// All routes, ordered by key.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.routes.values()
    }

    /// Freeze the table into an `axum::Router`.
    pub fn build(self) -> axum::Router {
        let terminal = terminal(self.not_found, self.method_not_allowed);
        let shared = Arc::new(Shared {
            chain: compose(&self.middlewares, terminal),
            reply: self.reply.clone(),
            max_body_size: self.max_body_size,
            request_timeout: self.request_timeout,
        });

        let mut by_endpoint: BTreeMap<&str, Vec<&Arc<Route>>> = BTreeMap::new();
        for route in self.routes.values() {
            by_endpoint.entry(route.endpoint()).or_default().push(route);
        }

        let mut app = axum::Router::new();
        for (endpoint, routes) in by_endpoint {
            let mut methods = MethodRouter::new();
            for route in routes {
                let Ok(filter) = MethodFilter::try_from(route.method().clone()) else {
                    tracing::warn!(route = %route.key(), "skipping route with unbindable method");
                    continue;
                };
                let shared = shared.clone();
                let route = route.clone();
                methods = methods.on(filter, move |req: http::Request<Body>| {
                    dispatch(shared.clone(), Resolution::Matched(route.clone()), req)
                });
            }
            let fallback = shared.clone();
            methods = methods.fallback(move |req: http::Request<Body>| {
                dispatch(fallback.clone(), Resolution::MethodNotAllowed, req)
            });
            app = app.route(endpoint, methods);
        }

        tracing::debug!(routes = self.routes.len(), middlewares = self.middlewares.len(), "router built");

        let panic_reply = self.reply;
        app.fallback(move |req: http::Request<Body>| {
            dispatch(shared.clone(), Resolution::NotFound, req)
        })
        .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send + 'static>| {
            panic_response(&panic_reply, panic)
        }))
    }
}

struct Shared {
    chain: HandlerFunc,
    reply: ReplyFactory,
    max_body_size: usize,
    request_timeout: Option<Duration>,
}

async fn dispatch(shared: Arc<Shared>, resolution: Resolution, req: http::Request<Body>) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let label = match &resolution {
        Resolution::Matched(route) => route.endpoint().to_string(),
        _ => "none".to_string(),
    };

    let (mut parts, body) = req.into_parts();

    let vars: Result<Vars, Error> = match &resolution {
        Resolution::Matched(_) | Resolution::MethodNotAllowed => {
            match RawPathParams::from_request_parts(&mut parts, &()).await {
                Ok(params) => Ok(params.iter().collect()),
                Err(rejection) => {
                    tracing::debug!(error = %rejection, "failed to decode path variables");
                    Err(Error::bad_request())
                }
            }
        }
        Resolution::NotFound => Ok(Vars::new()),
    };

    let declared = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    let body = if declared.is_some_and(|len| len > shared.max_body_size) {
        Err(too_large())
    } else {
        axum::body::to_bytes(body, shared.max_body_size)
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "failed to buffer request body");
                too_large()
            })
    };

    let response = match vars.and_then(|vars| body.map(|body| (vars, body))) {
        Ok((vars, body)) => {
            let req = Request::new(parts, body, vars, resolution);
            let w = ResponseWriter::new(shared.reply.clone());
            let chain = (shared.chain)(w, req);
            match shared.request_timeout {
                Some(limit) => match tokio::time::timeout(limit, chain).await {
                    Ok(w) => w.into_response(),
                    Err(_) => {
                        tracing::warn!(method = %method, route = %label, "request timed out");
                        let mut w = ResponseWriter::new(shared.reply.clone());
                        w.write_error(Error::request_timeout());
                        w.into_response()
                    }
                },
                None => chain.await.into_response(),
            }
        }
        Err(err) => {
            let mut w = ResponseWriter::new(shared.reply.clone());
            w.write_error(err);
            w.into_response()
        }
    };

    metrics::record_request(&method, response.status().as_u16(), &label, start);
    response
}

fn too_large() -> Error {
    Error::new(
        StatusCode::PAYLOAD_TOO_LARGE.as_u16(),
        "payload_too_large",
        "Request body too large",
    )
}

/// Innermost handler of the chain.
fn terminal(not_found: Option<HandlerFunc>, method_not_allowed: Option<HandlerFunc>) -> HandlerFunc {
    handler_fn(move |mut w: ResponseWriter, req: Request| {
        let not_found = not_found.clone();
        let method_not_allowed = method_not_allowed.clone();
        async move {
            match req.resolution().clone() {
                Resolution::Matched(route) => serve(route, w, req).await,
                Resolution::NotFound => match not_found {
                    Some(handler) => handler(w, req).await,
                    None => {
                        w.write_error(Error::endpoint_not_found());
                        w
                    }
                },
                Resolution::MethodNotAllowed => match method_not_allowed {
                    Some(handler) => handler(w, req).await,
                    None => {
                        w.write_error(Error::method_not_allowed());
                        w
                    }
                },
            }
        }
    })
}

async fn serve(route: Arc<Route>, mut w: ResponseWriter, req: Request) -> ResponseWriter {
    match route.dispatch() {
        Dispatch::Raw(handler) => {
            let response = handler(req.into_http()).await;
            w.set_raw(response);
            w
        }
        Dispatch::Typed(handler) => handler(w, req).await,
        Dispatch::Mapped(_) => {
            let reply = w.new_reply();
            match route.exec(req, reply).await {
                Ok(reply) => {
                    // An encode failure is already answered with 500.
                    let _ = w.write_reply(reply.as_ref());
                }
                Err(e) => {
                    tracing::error!(route = %route.key(), error = %e, "failed to encode handler result");
                    w.write_header(StatusCode::INTERNAL_SERVER_ERROR);
                    w.write(e.to_string().as_bytes());
                }
            }
            w
        }
    }
}

fn panic_response(reply: &ReplyFactory, panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!(panic = %detail, "handler panicked");

    let mut envelope = reply();
    envelope.set_error(Error::internal());
    encode_reply(envelope.as_ref())
}
