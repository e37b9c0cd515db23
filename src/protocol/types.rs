//! Message types for the MESH protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Envelope `type` classification.
///
/// The set is open: senders may use types this receiver does not know, and
/// those are carried through unchanged as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// Request expecting a response
    Request,
    /// Response to a request, carries a correlation ID
    Response,
    /// Status update, no response expected
    Notification,
    Other(String),
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::Request => "request",
            MessageType::Response => "response",
            MessageType::Notification => "notification",
            MessageType::Other(s) => s,
        }
    }
}

impl From<String> for MessageType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "request" => MessageType::Request,
            "response" => MessageType::Response,
            "notification" => MessageType::Notification,
            _ => MessageType::Other(s),
        }
    }
}

impl From<&str> for MessageType {
    fn from(s: &str) -> Self {
        MessageType::from(s.to_string())
    }
}

impl From<MessageType> for String {
    fn from(t: MessageType) -> Self {
        match t {
            MessageType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
