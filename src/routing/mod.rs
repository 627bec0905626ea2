//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (setup phase):
//!     handler
//!     → handler.rs (classify convention, capture signature)
//!     → route.rs (bind to method + endpoint)
//!     → router.rs (route table keyed "METHOD:endpoint")
//!
//! Request:
//!     router.rs (match, buffer, middleware)
//!     → route.rs exec (decode argument, invoke, fill envelope)
//! ```
//!
//! # Design Decisions
//! - Routes are immutable once registered
//! - Calling conventions are resolved at compile time through marker types

pub mod handler;
pub mod route;
pub mod router;

pub use handler::{BoundHandler, Convention, ExecError, FromInput, IntoOutcome, IntoRoute, Outcome, Signature, TypeDescriptor};
pub use route::{RegistrationError, Route};
pub use router::Router;
