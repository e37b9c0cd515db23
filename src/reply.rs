//! Reply routing: deliver a correlated response to the sender's callback.
//!
//! Delivery runs in its own task with its own timeout, so a slow or dead
//! callback never holds up the acknowledgment of the original request.
//! Failures are logged and audited, never retried.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::audit::{AuditSink, AuditStatus};
use crate::handlers::HandlerResponse;
use crate::protocol::{encode_message, Envelope, ReplyTo};

#[derive(Error, Debug)]
pub enum ReplyError {
    #[error("reply target has no url")]
    MissingUrl,

    #[error("could not encode reply: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("delivery failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct ReplyRouter {
    client: Client,
    agent_id: String,
    timeout: Duration,
    permits: Arc<Semaphore>,
    audit: Arc<AuditSink>,
}

impl ReplyRouter {
    pub fn new(
        agent_id: impl Into<String>,
        timeout: Duration,
        max_concurrent: usize,
        audit: Arc<AuditSink>,
    ) -> Self {
        Self {
            client: Client::new(),
            agent_id: agent_id.into(),
            timeout,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            audit,
        }
    }

    /// Where to send a reply, if one should be sent at all: the original
    /// must be a request, the handler must have produced a non-empty
    /// response, and `replyTo.url` must be set.
    pub fn reply_target<'a>(
        original: &'a Envelope,
        response: Option<&HandlerResponse>,
    ) -> Option<&'a ReplyTo> {
        if !original.is_request() {
            return None;
        }
        if response.map_or(true, HandlerResponse::is_empty) {
            return None;
        }
        original.reply_to.as_ref().filter(|r| r.url().is_some())
    }

    /// Build the response envelope for `original`.
    pub fn build_reply(&self, original: &Envelope, response: &HandlerResponse) -> Envelope {
        original.create_response(self.agent_id.clone(), response.reply_body())
    }

    /// Deliver `reply` to `reply_to`, waiting at most the configured timeout.
    pub async fn deliver(&self, reply_to: &ReplyTo, reply: &Envelope) -> Result<(), ReplyError> {
        let url = reply_to.url().ok_or(ReplyError::MissingUrl)?;
        let body = encode_message(reply)?;

        self.client
            .post(url)
            .bearer_auth(reply_to.token())
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    /// Deliver in the background. The outcome is logged and audited.
    pub fn spawn(&self, reply_to: ReplyTo, reply: Envelope) -> JoinHandle<()> {
        let router = self.clone();
        tokio::spawn(async move {
            let _permit = match router.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            let status = match router.deliver(&reply_to, &reply).await {
                Ok(()) => {
                    tracing::info!("Reply sent to {}", reply.to.as_deref().unwrap_or("?"));
                    AuditStatus::Sent
                }
                Err(e) => {
                    tracing::warn!(
                        "Reply to {} for {} failed: {}",
                        reply.to.as_deref().unwrap_or("?"),
                        reply.correlation_id.as_deref().unwrap_or("?"),
                        e
                    );
                    AuditStatus::Error
                }
            };

            // File append stays off the async workers.
            let audit = router.audit.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || audit.record(&reply, status)).await {
                tracing::warn!("Reply audit task failed: {}", e);
            }
        })
    }

    /// Route a reply for `original` if it qualifies; returns the delivery
    /// task when one was started.
    pub fn route(
        &self,
        original: &Envelope,
        response: Option<&HandlerResponse>,
    ) -> Option<JoinHandle<()>> {
        let reply_to = Self::reply_target(original, response)?.clone();
        let response = response?;
        let reply = self.build_reply(original, response);
        Some(self.spawn(reply_to, reply))
    }
}
