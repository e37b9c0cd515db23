//! HTTP surface of the receiver (Axum).

pub mod api;
pub mod router;
pub mod server;

pub use router::create_app_router;
pub use server::{run_server, WebServerConfig};
