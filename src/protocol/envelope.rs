//! MESH envelopes: the unit exchanged between agents.

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::types::MessageType;

/// Protocol tag stamped on envelopes produced by this process.
pub const MESH_PROTOCOL: &str = "mesh/1.0";

/// Placeholder used wherever an envelope field is missing.
pub const UNKNOWN: &str = "?";

/// Message envelope as it appears on the wire.
///
/// Every field is optional on receipt and decoded on its own: a field of the
/// wrong JSON type reads as absent instead of failing the whole envelope.
/// Fields this receiver does not model are kept in `extra` so inbox readers
/// see exactly what the sender sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Unique per sender
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub message_type: Option<MessageType>,
    /// Originating `id`, set on responses
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ReplyTo>,
    /// Opaque, passed back untouched on replies
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub reply_context: Option<Value>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub payload: Payload,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Envelope payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// `Some(Value::Null)` is an explicit `null` and is written back out
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Callback endpoint for delivering a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplyTo {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Bearer token presented to `url`
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Decode a field from whatever JSON value is present, reading a value of
/// the wrong type as `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient(deserializer)?.unwrap_or_default())
}

impl ReplyTo {
    /// The callback URL, if present and non-blank.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }

    pub fn token(&self) -> &str {
        self.token.as_deref().unwrap_or_default()
    }
}

impl Envelope {
    /// Envelope substituted when the nested message cannot be parsed.
    /// The raw text is preserved as the payload body.
    pub fn degraded(raw: impl Into<String>) -> Self {
        Self {
            payload: Payload {
                body: Some(Value::String(raw.into())),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn id_or_unknown(&self) -> &str {
        self.id.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn from_or_unknown(&self) -> &str {
        self.from.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn type_or_unknown(&self) -> &str {
        self.message_type
            .as_ref()
            .map(MessageType::as_str)
            .unwrap_or(UNKNOWN)
    }

    pub fn subject(&self) -> &str {
        self.payload.subject.as_deref().unwrap_or_default()
    }

    pub fn is_request(&self) -> bool {
        self.message_type == Some(MessageType::Request)
    }

    /// Build a response correlated with this envelope. `correlationId`,
    /// `replyContext` and `payload.body` are always present on the wire,
    /// as `"?"` or `null` when there is nothing to carry.
    pub fn create_response(&self, from_agent: impl Into<String>, body: Value) -> Self {
        Self {
            protocol: Some(MESH_PROTOCOL.to_string()),
            id: Some(generate_id()),
            timestamp: Some(current_timestamp()),
            from: Some(from_agent.into()),
            to: Some(self.from_or_unknown().to_string()),
            message_type: Some(MessageType::Response),
            correlation_id: Some(self.id_or_unknown().to_string()),
            reply_to: None,
            reply_context: Some(self.reply_context.clone().unwrap_or(Value::Null)),
            payload: Payload {
                subject: Some(format!("Re: {}", self.subject())),
                body: Some(body),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }
}

/// Fresh message id: `msg_` followed by 32 hex characters.
pub fn generate_id() -> String {
    format!("msg_{}", uuid::Uuid::new_v4().simple())
}

/// Current UTC time in the wire format, millisecond precision.
pub fn current_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
