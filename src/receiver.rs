//! The envelope-handling pipeline behind `POST /`.
//!
//! decode → audit → inbox → dispatch → (reply) → acknowledge

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::audit::{truncate_chars, AuditSink, AuditStatus};
use crate::config::{MeshPaths, Settings};
use crate::handlers::{create_handler, Dispatcher};
use crate::inbox::InboxBuffer;
use crate::protocol::{decode_request, CodecError};
use crate::reply::ReplyRouter;

/// Characters of the subject shown in the per-message log line.
const LOG_SUBJECT_CHARS: usize = 60;

/// Receipt acknowledgment, returned with 202.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ack {
    pub ok: bool,
    pub id: String,
}

/// Process status for `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub agent: String,
    pub inbox: usize,
}

/// Outcome of one receipt. The reply task is exposed for callers that want
/// to wait for delivery; the HTTP layer ignores it.
pub struct Receipt {
    pub ack: Ack,
    pub reply: Option<JoinHandle<()>>,
}

pub struct Receiver {
    agent_id: String,
    audit: Arc<AuditSink>,
    inbox: InboxBuffer,
    dispatcher: Dispatcher,
    replies: ReplyRouter,
}

impl Receiver {
    pub fn new(
        agent_id: impl Into<String>,
        audit: Arc<AuditSink>,
        inbox: InboxBuffer,
        dispatcher: Dispatcher,
        replies: ReplyRouter,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            audit,
            inbox,
            dispatcher,
            replies,
        }
    }

    /// Wire up a receiver from resolved settings.
    pub fn from_settings(settings: &Settings, paths: &MeshPaths) -> Self {
        let audit = Arc::new(AuditSink::new(paths.audit_log(), settings.agent.clone()));
        let handler = settings.handler.as_deref().map(create_handler);
        let dispatcher = Dispatcher::new(
            handler,
            settings.handler_timeout(),
            settings.max_concurrent_handlers,
        );
        let replies = ReplyRouter::new(
            settings.agent.clone(),
            settings.reply_timeout(),
            settings.max_concurrent_replies,
            audit.clone(),
        );

        Self::new(
            settings.agent.clone(),
            audit,
            InboxBuffer::new(settings.inbox_capacity),
            dispatcher,
            replies,
        )
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn inbox(&self) -> &InboxBuffer {
        &self.inbox
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn health(&self) -> Health {
        Health {
            status: "ok",
            agent: self.agent_id.clone(),
            inbox: self.inbox.len(),
        }
    }

    /// Handle one inbound request body.
    ///
    /// Only a body that is not JSON fails. Once the envelope is decodable the
    /// receipt is acknowledged whatever happens downstream.
    pub async fn receive(&self, body: &[u8]) -> Result<Receipt, CodecError> {
        let envelope = decode_request(body)?;

        tracing::info!(
            "{} → {} | {} | {}",
            envelope.from_or_unknown(),
            self.agent_id,
            envelope.type_or_unknown(),
            truncate_chars(envelope.subject(), LOG_SUBJECT_CHARS)
        );

        self.audit.record(&envelope, AuditStatus::Received);

        if let Some(evicted) = self.inbox.append(envelope.clone()) {
            tracing::debug!("Inbox full, evicted {}", evicted.id_or_unknown());
        }

        let response = self.dispatcher.dispatch(&envelope).await;
        let reply = self.replies.route(&envelope, response.as_ref());

        Ok(Receipt {
            ack: Ack {
                ok: true,
                id: envelope.id_or_unknown().to_string(),
            },
            reply,
        })
    }
}
