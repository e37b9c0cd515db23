//! Envelope handlers.

use std::sync::Arc;

pub mod command;
pub mod dispatcher;
pub mod handler;
pub mod http;

pub use command::CommandHandler;
pub use dispatcher::Dispatcher;
pub use handler::{Handler, HandlerError, HandlerResponse};
pub use http::HttpHandler;

/// Handler factory: `http(s)://` URLs become HTTP handlers, anything else is
/// treated as an executable path.
pub fn create_handler(target: &str) -> Arc<dyn Handler> {
    let target = target.trim();
    if target.starts_with("http://") || target.starts_with("https://") {
        Arc::new(HttpHandler::new(target))
    } else {
        Arc::new(CommandHandler::new(target))
    }
}
