//! HTTP handler: POSTs the envelope to a local service.

use async_trait::async_trait;
use reqwest::Client;

use super::handler::{Handler, Result};
use crate::protocol::Envelope;

pub struct HttpHandler {
    client: Client,
    url: String,
}

impl HttpHandler {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Handler for HttpHandler {
    fn name(&self) -> &str {
        &self.url
    }

    async fn invoke(&self, envelope: &Envelope) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .json(envelope)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.text().await?)
    }
}
