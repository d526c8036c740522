use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use concierge_core::{ChatReply, ChatRequest, Responder};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Calls a remote responder endpoint (`POST /api/chat`).
pub struct HttpResponder {
    client: Client,
    endpoint: String,
}

impl HttpResponder {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Responder for HttpResponder {
    fn name(&self) -> &str {
        "http"
    }

    async fn respond(&self, request: &ChatRequest) -> Result<ChatReply> {
        debug!(endpoint = %self.endpoint, messages = request.messages.len(), "Calling responder");
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .context("Responder request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Responder returned {}: {}", status, body);
        }

        response
            .json::<ChatReply>()
            .await
            .context("Malformed responder reply")
    }
}
