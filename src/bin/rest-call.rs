//! Command-line client for dispatch servers.
//!
//! Sends an argument payload to a route, either as the `query` parameter
//! or as the request body, and prints the reply envelope.

use clap::{Parser, ValueEnum};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "rest-call")]
#[command(about = "Call a rest-dispatch route and print the reply", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3303")]
    url: String,

    /// HTTP method.
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Route path, e.g. /echo.
    path: String,

    /// JSON argument payload.
    #[arg(short, long)]
    data: Option<String>,

    /// Where to put the payload.
    #[arg(long, value_enum, default_value_t = Carrier::Body)]
    via: Carrier,
}

#[derive(Clone, Copy, ValueEnum)]
enum Carrier {
    /// `?query=<payload>`
    Query,
    /// Request body
    Body,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(data) = &cli.data {
        serde_json::from_str::<Value>(data).map_err(|e| format!("--data is not valid JSON: {e}"))?;
    }

    let method = Method::from_bytes(cli.method.to_uppercase().as_bytes())?;
    let client = reqwest::Client::new();
    let mut request = client.request(method, format!("{}{}", cli.url.trim_end_matches('/'), cli.path));

    if let Some(data) = cli.data {
        request = match cli.via {
            Carrier::Query => request.query(&[("query", data)]),
            Carrier::Body => request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(data),
        };
    }

    let res = request.send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    match serde_json::from_str::<Value>(&text) {
        Ok(envelope) => {
            println!("{}", serde_json::to_string_pretty(&envelope)?);
            if let Some(err) = envelope.get("error") {
                eprintln!(
                    "Error: {} {} ({})",
                    err["status"], err["code"].as_str().unwrap_or("?"), err["msg"].as_str().unwrap_or("")
                );
            }
        }
        Err(_) => println!("{text}"),
    }

    if !status.is_success() {
        eprintln!("HTTP status {}", status);
        std::process::exit(1);
    }
    Ok(())
}
