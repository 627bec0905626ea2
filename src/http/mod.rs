//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tower-http layers)
//!     → routing (match + middleware)
//!     → request.rs (per-request context, path vars from vars.rs)
//!     → response.rs (buffered writer, reply encoding)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod vars;

pub use request::Request;
pub use response::ResponseWriter;
pub use server::HttpServer;
pub use vars::Vars;
