//! meshrelay library root.
//!
//! A standalone MESH receiver: decode inbound envelopes, audit them, keep a
//! bounded inbox, dispatch to an optional handler and route correlated
//! replies back to the sender.

pub mod audit;
pub mod cli;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod error;
pub mod handlers;
pub mod inbox;
pub mod logging;
pub mod protocol;
pub mod receiver;
pub mod reply;
pub mod web;

pub use cli::Commands;
pub use config::{load_settings, MeshPaths, Settings};
pub use error::{Error, Result};
pub use handlers::{Dispatcher, Handler, HandlerResponse};
pub use inbox::InboxBuffer;
pub use protocol::Envelope;
pub use receiver::Receiver;
pub use reply::ReplyRouter;
