//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{self, StatusCode};
use serde::Deserialize;
use tokio::net::TcpListener;

use rest_dispatch::config::ServerConfig;
use rest_dispatch::{Error, HttpServer, Request, ResponseWriter, Router, Shutdown};

#[derive(Debug, Default, Deserialize)]
pub struct EchoArg {
    pub value: String,
}

async fn hello() -> &'static str {
    "Hello, world!"
}

async fn echo(arg: EchoArg) -> Result<String, Error> {
    if arg.value.is_empty() {
        return Err(Error::bad_request().with_message("value is empty"));
    }
    Ok(format!("hello, {}", arg.value))
}

async fn echo_path(req: Request) -> Option<String> {
    req.vars().string("msg")
}

async fn raw(_req: http::Request<Body>) -> (StatusCode, &'static str) {
    (StatusCode::OK, "raw handler ran")
}

async fn typed(mut w: ResponseWriter, req: Request) -> ResponseWriter {
    let you = req.vars().string_or("you", "");
    let _ = w.write_json(&you);
    w
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_millis(300)).await;
    "finally"
}

async fn stuck() -> &'static str {
    tokio::time::sleep(Duration::from_millis(1500)).await;
    "never seen"
}

/// Router with the demo routes plus two slow ones.
pub fn demo_routes() -> Router {
    let mut router = Router::new();
    router.get("/hello", hello);
    router.post("/echo", echo);
    router.get("/echo/{msg}", echo_path);
    router.get("/http", raw);
    router.get("/src/{you}", typed);
    router.get("/slow", slow);
    router.get("/stuck", stuck);
    router
}

/// Start a server on an ephemeral port and return its address.
pub async fn start_server(config: ServerConfig, routes: Router) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config, routes);
    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if let Err(e) = server.run(listener).await {
            eprintln!("server error: {e}");
        }
    });

    wait_until_ready(addr).await;
    (addr, shutdown)
}

async fn wait_until_ready(addr: SocketAddr) {
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("server at {addr} did not come up");
}
