//! Handler trait: the external processing capability behind the receiver.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::protocol::Envelope;

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Handler exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, HandlerError>;

/// An external capability that processes one envelope and returns its raw
/// textual output. Subprocess, HTTP and in-process handlers are
/// interchangeable behind this trait.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Process an envelope. The dispatcher bounds this call with a timeout.
    async fn invoke(&self, envelope: &Envelope) -> Result<String>;
}

/// Structured handler output.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResponse(Map<String, Value>);

impl HandlerResponse {
    /// Interpret handler output. Blank output means "no response"; a JSON
    /// object is used as-is; anything else is wrapped as `{"body": text}`.
    pub fn from_output(output: &str) -> Option<Self> {
        let text = output.trim();
        if text.is_empty() {
            return None;
        }

        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Some(Self(map)),
            _ => {
                let mut map = Map::new();
                map.insert("body".to_string(), Value::String(text.to_string()));
                Some(Self(map))
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Body for the reply payload: the `body` field, or the whole response
    /// serialized when there is none.
    pub fn reply_body(&self) -> Value {
        match self.0.get("body") {
            Some(body) => body.clone(),
            None => Value::String(Value::Object(self.0.clone()).to_string()),
        }
    }
}
