//! HTTP API surface
//!
//! Thin handlers: validate, delegate to the owned services, shape the
//! response. No generation or queue logic lives here.

pub mod routes;
pub mod stream;
pub mod tasks;
pub mod versions;

pub use routes::build_router;
