//! Demo server for the dispatch router.
//!
//! ```text
//! GET  /hello        → {"response":"Hello, world!"}
//! POST /echo         → {"response":"hello, <value>"} from {"value": ...}
//! GET  /echo/{msg}   → {"response":"<msg>"}, or an error for msg = "error"
//! GET  /log          → {} after logging a line
//! GET  /http         → plain text from a raw transport handler
//! GET  /src/{you}    → JSON string written by a typed handler
//! ```

use std::path::PathBuf;

use axum::body::Body;
use axum::http;
use clap::Parser;
use serde::Deserialize;
use tokio::net::TcpListener;

use rest_dispatch::config::{load_config, ServerConfig};
use rest_dispatch::middleware::RequestLogger;
use rest_dispatch::observability::{logging, metrics};
use rest_dispatch::{Error, HttpServer, Request, ResponseWriter, Router};

#[derive(Parser)]
#[command(name = "rest-dispatch")]
#[command(about = "Demo server for type-directed REST dispatch", long_about = None)]
struct Cli {
    /// TOML config file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct EchoArg {
    value: String,
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

async fn echo_path(req: Request) -> Result<String, Error> {
    let msg = req.vars().string_or("msg", "");
    if msg == "error" {
        return Err(Error::bad_request().with_message("error in echo"));
    }
    Ok(msg)
}

async fn log_line() {
    tracing::info!("logging");
}

async fn raw(_req: http::Request<Body>) -> &'static str {
    "raw handler ran"
}

async fn typed(mut w: ResponseWriter, req: Request) -> ResponseWriter {
    let you = req.vars().string_or("you", "");
    if let Err(e) = w.write_json(&you) {
        w.write_error(Error::internal().with_message(e.to_string()));
    }
    w
}

fn routes() -> Router {
    let mut router = Router::new();
    router.use_middleware(RequestLogger);
    router.get("/hello", hello);
    router.post("/echo", echo);
    router.get("/echo/{msg}", echo_path);
    router.get("/log", log_line);
    router.get("/http", raw);
    router.get("/src/{you}", typed);
    router
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!("rest-dispatch v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_body_size = config.limits.max_body_size,
        request_timeout_secs = config.timeouts.request_secs,
        cors = config.cors.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let router = routes();
    for route in router.routes() {
        tracing::debug!(route = %route.key(), convention = ?route.convention(), "registered");
    }

    HttpServer::new(config, router).run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
