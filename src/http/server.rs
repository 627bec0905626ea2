//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Apply config to the dispatch router (body limit, request timeout, CORS)
//! - Wire up tower-http layers (request ID, tracing)
//! - Serve on a listener with graceful shutdown

use std::time::Duration;

use axum::body::Body;
use axum::http;
use futures_util::future::BoxFuture;
use tokio::net::TcpListener;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::lifecycle::Shutdown;
use crate::routing::Router;

/// HTTP server for a dispatch router.
pub struct HttpServer {
    router: axum::Router,
    config: ServerConfig,
    shutdown: Shutdown,
    stop: BoxFuture<'static, ()>,
}

impl HttpServer {
    /// Build the server. A configured `[cors]` table installs
    /// [`CorsMiddleware`](crate::middleware::CorsMiddleware) after any
    /// middleware already on `routes`.
    pub fn new(config: ServerConfig, mut routes: Router) -> Self {
        if let Some(cors) = config.cors.clone() {
            routes.use_middleware(cors);
        }
        let routes = routes
            .with_body_limit(config.limits.max_body_size)
            .with_request_timeout(Duration::from_secs(config.timeouts.request_secs));
        let router = Self::build_router(routes);
        // Subscribed here so a trigger sent before `run` is still seen.
        let shutdown = Shutdown::new();
        let stop = Box::pin(shutdown.signaled());
        Self {
            router,
            config,
            shutdown,
            stop,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(routes: Router) -> axum::Router {
        routes
            .build()
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|req: &http::Request<Body>| {
                let request_id = req
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Handle that stops [`HttpServer::run`] when triggered.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// The fully layered application, for in-process use.
    pub fn app(&self) -> axum::Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(self.stop)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
